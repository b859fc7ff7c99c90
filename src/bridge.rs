//! Entry points for a managed runtime.
//!
//! Each `native_*` function takes raw handles as the runtime stores them
//! (`i64`) and reports failure by raising an error through
//! [`ManagedRuntime::signal_error`] and returning a sentinel, never by
//! panicking across the boundary.

use crate::byte_source::ByteSource;
use crate::document;
use crate::error::{RendererError, Result};
use crate::handle::{DocumentHandle, PageHandle};
use crate::page;
use crate::render::{self, DestRect};
use crate::target::PixelBuffer;
use std::sync::OnceLock;

/// Returned in place of a handle when an open fails.
pub const INVALID_HANDLE: i64 = -1;

/// Class whose integer fields receive a page size.
pub const SIZE_CLASS: &str = "android/graphics/Point";

/// Exception families the runtime raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    IllegalState,
    IllegalArgument,
}

impl ErrorKind {
    pub fn of(error: &RendererError) -> Self {
        match error {
            RendererError::DocumentLoad { .. } | RendererError::Io(_) => ErrorKind::Io,
            RendererError::InvalidArgument(_) => ErrorKind::IllegalArgument,
            _ => ErrorKind::IllegalState,
        }
    }
}

pub trait ManagedRuntime {
    /// Raises an error in the caller; it is thrown once the native call
    /// returns.
    fn signal_error(&mut self, kind: ErrorKind, message: &str);
}

/// Opaque id of a field of a runtime class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId(pub u64);

/// Looks up field ids; used once, at load.
pub trait FieldResolver {
    fn field_id(&mut self, class: &str, name: &str, signature: &str) -> Option<FieldId>;
}

/// A runtime object with integer fields, such as a point.
pub trait SizeRecord {
    fn set_int_field(&mut self, field: FieldId, value: i32);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeFields {
    pub x: FieldId,
    pub y: FieldId,
}

/// Field ids resolved once per process.
#[derive(Debug, Default)]
pub struct SizeFieldCache {
    fields: OnceLock<SizeFields>,
}

impl SizeFieldCache {
    pub const fn new() -> Self {
        SizeFieldCache {
            fields: OnceLock::new(),
        }
    }

    /// Resolves the size fields unless already resolved.
    pub fn resolve(&self, resolver: &mut dyn FieldResolver) -> Result<SizeFields> {
        if let Some(fields) = self.fields.get() {
            return Ok(*fields);
        }
        let x = resolver.field_id(SIZE_CLASS, "x", "I");
        let y = resolver.field_id(SIZE_CLASS, "y", "I");
        let (Some(x), Some(y)) = (x, y) else {
            return Err(RendererError::InvalidState(format!(
                "cannot resolve fields of {}",
                SIZE_CLASS
            )));
        };
        Ok(*self.fields.get_or_init(|| SizeFields { x, y }))
    }

    pub fn get(&self) -> Option<SizeFields> {
        self.fields.get().copied()
    }

    /// Writes `width` and `height` into `record`.
    pub fn write(&self, record: &mut dyn SizeRecord, width: i32, height: i32) -> Result<()> {
        let fields = self
            .get()
            .ok_or_else(|| RendererError::InvalidState("size fields not resolved".into()))?;
        record.set_int_field(fields.x, width);
        record.set_int_field(fields.y, height);
        Ok(())
    }
}

static SIZE_FIELDS: SizeFieldCache = SizeFieldCache::new();

/// Module load hook: caches the field ids page sizes are written through.
pub fn on_load(resolver: &mut dyn FieldResolver) -> Result<()> {
    SIZE_FIELDS.resolve(resolver)?;
    log::debug!("bridge loaded");
    Ok(())
}

/// Raises `result`'s error, if any, and substitutes `fallback`.
fn report<T>(rt: &mut dyn ManagedRuntime, result: Result<T>, fallback: T) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            log::debug!("signalling {:?}: {}", ErrorKind::of(&e), e);
            rt.signal_error(ErrorKind::of(&e), &e.to_string());
            fallback
        }
    }
}

fn document_handle(raw: i64) -> Result<DocumentHandle> {
    DocumentHandle::from_raw(raw).ok_or(RendererError::StaleHandle)
}

fn page_handle(raw: i64) -> Result<PageHandle> {
    PageHandle::from_raw(raw).ok_or(RendererError::StaleHandle)
}

/// Opens a document over a descriptor the caller keeps ownership of.
#[cfg(unix)]
pub fn native_create(rt: &mut dyn ManagedRuntime, fd: std::os::fd::RawFd, size: i64) -> i64 {
    use crate::byte_source::FdSource;
    use std::io;
    use std::os::fd::BorrowedFd;

    let result = (|| -> Result<DocumentHandle> {
        if fd < 0 || size < 0 {
            return Err(RendererError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("bad descriptor {} of size {}", fd, size),
            )));
        }
        // SAFETY: the descriptor is non-negative and the caller keeps it open
        // for the duration of this call; it is duplicated before returning.
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        let source = FdSource::new(borrowed, size as u64)?;
        document::open_document(source)
    })();
    report(rt, result.map(DocumentHandle::to_raw), INVALID_HANDLE)
}

/// Opens a document over any byte source.
pub fn native_create_from_source<S: ByteSource + 'static>(
    rt: &mut dyn ManagedRuntime,
    source: S,
) -> i64 {
    let result = document::open_document(source).map(DocumentHandle::to_raw);
    report(rt, result, INVALID_HANDLE)
}

/// Opens a page and writes its size, in whole points, into `out_size`.
pub fn native_open_page_and_get_size(
    rt: &mut dyn ManagedRuntime,
    doc: i64,
    index: i32,
    out_size: &mut dyn SizeRecord,
) -> i64 {
    let result = (|| -> Result<i64> {
        let doc = document_handle(doc)?;
        let index = usize::try_from(index).map_err(|_| RendererError::PageLoad)?;
        if SIZE_FIELDS.get().is_none() {
            return Err(RendererError::InvalidState("size fields not resolved".into()));
        }
        let (page, size) = page::open_page(doc, index)?;
        SIZE_FIELDS.write(out_size, size.width, size.height)?;
        Ok(page.to_raw())
    })();
    report(rt, result, INVALID_HANDLE)
}

pub fn native_close_page(rt: &mut dyn ManagedRuntime, page: i64) {
    let result = page_handle(page).and_then(page::close_page);
    report(rt, result, ())
}

pub fn native_close(rt: &mut dyn ManagedRuntime, doc: i64) {
    let result = document_handle(doc).and_then(document::close_document);
    report(rt, result, ())
}

pub fn native_get_page_count(rt: &mut dyn ManagedRuntime, doc: i64) -> i32 {
    let result = document_handle(doc)
        .and_then(document::page_count)
        .map(|count| i32::try_from(count).unwrap_or(i32::MAX));
    report(rt, result, 0)
}

pub fn native_scale_for_printing(rt: &mut dyn ManagedRuntime, doc: i64) -> bool {
    let result = document_handle(doc).and_then(document::print_scaling);
    report(rt, result, false)
}

#[allow(clippy::too_many_arguments)]
pub fn native_render_page(
    rt: &mut dyn ManagedRuntime,
    doc: i64,
    page: i64,
    bitmap: &mut dyn PixelBuffer,
    dest_left: i32,
    dest_top: i32,
    dest_right: i32,
    dest_bottom: i32,
    render_mode: i32,
) {
    let result = (|| -> Result<()> {
        let doc = document_handle(doc)?;
        let page = page_handle(page)?;
        let dest = DestRect::new(dest_left, dest_top, dest_right, dest_bottom);
        render::render_page(doc, page, bitmap, dest, render_mode, None)
    })();
    report(rt, result, ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct Fields(Vec<(String, String)>);

    impl FieldResolver for Fields {
        fn field_id(&mut self, class: &str, name: &str, signature: &str) -> Option<FieldId> {
            self.0.push((class.to_string(), format!("{}:{}", name, signature)));
            match name {
                "x" => Some(FieldId(1)),
                "y" => Some(FieldId(2)),
                _ => None,
            }
        }
    }

    struct Missing;

    impl FieldResolver for Missing {
        fn field_id(&mut self, _: &str, _: &str, _: &str) -> Option<FieldId> {
            None
        }
    }

    #[derive(Default)]
    struct Point(Vec<(FieldId, i32)>);

    impl SizeRecord for Point {
        fn set_int_field(&mut self, field: FieldId, value: i32) {
            self.0.push((field, value));
        }
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(ErrorKind::of(&RendererError::DocumentLoad { code: 3 }), ErrorKind::Io);
        assert_eq!(
            ErrorKind::of(&RendererError::Io(io::Error::other("x"))),
            ErrorKind::Io
        );
        assert_eq!(ErrorKind::of(&RendererError::PageLoad), ErrorKind::IllegalState);
        assert_eq!(ErrorKind::of(&RendererError::PageSize), ErrorKind::IllegalState);
        assert_eq!(ErrorKind::of(&RendererError::StaleHandle), ErrorKind::IllegalState);
        assert_eq!(
            ErrorKind::of(&RendererError::RenderTarget("x".into())),
            ErrorKind::IllegalState
        );
        assert_eq!(
            ErrorKind::of(&RendererError::InvalidArgument("x".into())),
            ErrorKind::IllegalArgument
        );
    }

    #[test]
    fn test_field_cache_resolves_once() {
        let cache = SizeFieldCache::new();
        let mut point = Point::default();
        assert!(cache.write(&mut point, 1, 2).is_err());
        assert!(cache.resolve(&mut Missing).is_err());

        let mut resolver = Fields(Vec::new());
        let fields = cache.resolve(&mut resolver).unwrap();
        assert_eq!(fields, SizeFields { x: FieldId(1), y: FieldId(2) });
        assert_eq!(resolver.0[0], (SIZE_CLASS.to_string(), "x:I".to_string()));

        // Later resolvers are not consulted
        assert_eq!(cache.resolve(&mut Missing).unwrap(), fields);
        cache.write(&mut point, 612, 792).unwrap();
        assert_eq!(point.0, vec![(FieldId(1), 612), (FieldId(2), 792)]);
    }
}
