//! Color space resolution.
//!
//! Maps `/ColorSpace` values (names, resource entries and family arrays) to
//! the device spaces the renderer paints with.

use super::graphics_state::ColorSpace;
use crate::core::error::{PDFError, PDFResult};
use crate::core::parser::{Dict, DictExt, PDFObject};
use crate::core::xref::XRef;

const MAX_DEPTH: usize = 8;

/// Resolves a color space operand or dictionary entry. Names that are not
/// device families are looked up in the resources' `/ColorSpace` dictionary.
pub fn resolve_color_space(
    xref: &mut XRef,
    obj: &PDFObject,
    resources: &Dict,
) -> PDFResult<ColorSpace> {
    resolve(xref, obj, resources, 0)
}

fn resolve(xref: &mut XRef, obj: &PDFObject, resources: &Dict, depth: usize) -> PDFResult<ColorSpace> {
    if depth > MAX_DEPTH {
        return Err(PDFError::Format("color space nested too deeply".into()));
    }
    let obj = PDFObject::clone(&*xref.fetch_if_ref(obj)?);
    match &obj {
        PDFObject::Name(name) => {
            if let Some(space) = family_from_name(name) {
                return Ok(space);
            }
            let entry = match xref.get_resolved(resources, "ColorSpace")? {
                Some(spaces) => spaces.as_dict().and_then(|d| d.get(name.as_str())).cloned(),
                None => None,
            };
            match entry {
                Some(entry) => resolve(xref, &entry, resources, depth + 1),
                None => Err(PDFError::Format(format!("unknown color space /{}", name))),
            }
        }
        PDFObject::Array(items) => {
            let family = items
                .first()
                .and_then(|f| f.as_name())
                .ok_or_else(|| PDFError::Format("color space array without family".into()))?;
            match family {
                "ICCBased" => {
                    let stream = match items.get(1) {
                        Some(s) => PDFObject::clone(&*xref.fetch_if_ref(s)?),
                        None => PDFObject::Null,
                    };
                    let dict = stream.as_dict().cloned().unwrap_or_default();
                    match dict.get_number("N").map(|n| n as usize) {
                        Some(1) => Ok(ColorSpace::DeviceGray),
                        Some(3) => Ok(ColorSpace::DeviceRGB),
                        Some(4) => Ok(ColorSpace::DeviceCMYK),
                        _ => match dict.get("Alternate") {
                            Some(alt) => resolve(xref, alt, resources, depth + 1),
                            None => Err(PDFError::Format("ICCBased space without /N".into())),
                        },
                    }
                }
                "Indexed" | "I" => {
                    let base = match items.get(1) {
                        Some(base) => resolve(xref, base, resources, depth + 1)?,
                        None => return Err(PDFError::Format("Indexed space without base".into())),
                    };
                    let hival = items
                        .get(2)
                        .and_then(|h| h.as_number())
                        .unwrap_or(0.0)
                        .clamp(0.0, 255.0) as u8;
                    let lookup = match items.get(3) {
                        Some(lookup) => {
                            let lookup = xref.fetch_if_ref(lookup)?;
                            match &*lookup {
                                PDFObject::Stream(stream) => xref.decode_stream_data(stream)?,
                                other => other.as_bytes().map(<[u8]>::to_vec).unwrap_or_default(),
                            }
                        }
                        None => Vec::new(),
                    };
                    Ok(ColorSpace::Indexed {
                        base: Box::new(base),
                        hival,
                        lookup,
                    })
                }
                "Separation" => Ok(ColorSpace::Tint(1)),
                "DeviceN" => {
                    let count = match items.get(1) {
                        Some(names) => xref.fetch_if_ref(names)?.as_array().map_or(1, <[_]>::len),
                        None => 1,
                    };
                    Ok(ColorSpace::Tint(count.max(1)))
                }
                "Pattern" => Ok(ColorSpace::Pattern),
                other => family_from_name(other)
                    .ok_or_else(|| PDFError::Unsupported(format!("color space /{}", other))),
            }
        }
        other => Err(PDFError::Format(format!("invalid color space {:?}", other))),
    }
}

fn family_from_name(name: &str) -> Option<ColorSpace> {
    Some(match name {
        "DeviceGray" | "G" | "CalGray" => ColorSpace::DeviceGray,
        "DeviceRGB" | "RGB" | "CalRGB" | "Lab" => ColorSpace::DeviceRGB,
        "DeviceCMYK" | "CMYK" => ColorSpace::DeviceCMYK,
        "Pattern" => ColorSpace::Pattern,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stream::Stream;

    fn empty_xref() -> XRef {
        // No xref table: the object scan rebuilds it
        let pdf = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\ntrailer\n<< /Root 1 0 R >>\n%%EOF\n";
        XRef::open(Box::new(Stream::from_bytes(pdf.to_vec())), None, 16).unwrap()
    }

    #[test]
    fn test_device_names() {
        let mut xref = empty_xref();
        let resources = Dict::default();
        let rgb = PDFObject::Name("RGB".into());
        assert_eq!(
            resolve_color_space(&mut xref, &rgb, &resources).unwrap(),
            ColorSpace::DeviceRGB
        );
    }

    #[test]
    fn test_named_resource_and_indexed() {
        let mut xref = empty_xref();
        let indexed = PDFObject::array([
            PDFObject::Name("Indexed".into()),
            PDFObject::Name("DeviceRGB".into()),
            PDFObject::Number(1.0),
            PDFObject::HexString(vec![255, 0, 0, 0, 255, 0]),
        ]);
        let mut spaces = Dict::default();
        spaces.insert("CS0".into(), indexed);
        let mut resources = Dict::default();
        resources.insert("ColorSpace".into(), PDFObject::Dictionary(spaces));

        let space =
            resolve_color_space(&mut xref, &PDFObject::Name("CS0".into()), &resources).unwrap();
        assert_eq!(space.color(&[1.0]).rgb8(), [0, 255, 0]);

        let missing = resolve_color_space(&mut xref, &PDFObject::Name("CS9".into()), &resources);
        assert!(missing.is_err());
    }

    #[test]
    fn test_indirect_icc_profile() {
        let pdf = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n\
2 0 obj\n<< /N 1 /Length 0 >>\nstream\n\nendstream\nendobj\n\
3 0 obj\n[/ICCBased 2 0 R]\nendobj\n\
trailer\n<< /Root 1 0 R >>\n%%EOF\n";
        let mut xref = XRef::open(Box::new(Stream::from_bytes(pdf.to_vec())), None, 16).unwrap();
        let space = PDFObject::Ref(crate::core::parser::Ref::new(3, 0));
        assert_eq!(
            resolve_color_space(&mut xref, &space, &Dict::default()).unwrap(),
            ColorSpace::DeviceGray
        );
    }
}
