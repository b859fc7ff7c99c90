//! Optional content (layers).
//!
//! An [`OCContext`] captures which optional content groups are visible for one
//! intended use of the document (viewing, printing, ...). Visibility comes
//! from the default configuration in `/OCProperties /D`: the base state, the
//! explicit ON/OFF lists, then the usage application rules in `/AS`.

use super::document::PDFDocument;
use super::error::PDFResult;
use super::parser::{Dict, DictExt, PDFObject, Ref};
use super::xref::XRef;
use rustc_hash::FxHashMap;
use std::ops::Deref;

/// Deepest `/VE` visibility expression that is evaluated.
const MAX_EXPRESSION_DEPTH: usize = 32;

/// Intended use of the rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OCUsage {
    View,
    Design,
    Print,
    Export,
}

impl OCUsage {
    /// The `/Event` name that selects usage application rules.
    pub fn event_name(self) -> &'static str {
        match self {
            OCUsage::View => "View",
            OCUsage::Design => "Design",
            OCUsage::Print => "Print",
            OCUsage::Export => "Export",
        }
    }
}

/// Visibility policy of an optional content membership dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisibilityPolicy {
    AllOn,
    AnyOn,
    AnyOff,
    AllOff,
}

impl VisibilityPolicy {
    fn from_name(name: Option<&str>) -> Self {
        match name {
            Some("AllOn") => VisibilityPolicy::AllOn,
            Some("AnyOff") => VisibilityPolicy::AnyOff,
            Some("AllOff") => VisibilityPolicy::AllOff,
            _ => VisibilityPolicy::AnyOn,
        }
    }

    fn apply(self, states: &[bool]) -> bool {
        match self {
            VisibilityPolicy::AllOn => states.iter().all(|on| *on),
            VisibilityPolicy::AnyOn => states.iter().any(|on| *on),
            VisibilityPolicy::AnyOff => states.iter().any(|on| !on),
            VisibilityPolicy::AllOff => states.iter().all(|on| !on),
        }
    }
}

/// Optional content visibility for one usage.
#[derive(Debug, Clone)]
pub struct OCContext {
    usage: OCUsage,

    /// Visibility of each group, keyed by the group's object number
    groups: FxHashMap<u32, bool>,
}

impl OCContext {
    /// Evaluates the document's default optional content configuration.
    pub fn new(doc: &mut PDFDocument, usage: OCUsage) -> PDFResult<Self> {
        let properties = doc.oc_properties()?;
        let mut context = OCContext::all_visible(usage);
        if let Some(properties) = properties {
            context.load_config(doc.xref_mut(), &properties)?;
        }
        Ok(context)
    }

    /// A context in which every group is visible.
    pub fn all_visible(usage: OCUsage) -> Self {
        OCContext {
            usage,
            groups: FxHashMap::default(),
        }
    }

    pub fn usage(&self) -> OCUsage {
        self.usage
    }

    /// Visibility of a group; groups the configuration does not mention are
    /// visible.
    pub fn is_group_visible(&self, group: Ref) -> bool {
        self.groups.get(&group.num).copied().unwrap_or(true)
    }

    fn load_config(&mut self, xref: &mut XRef, properties: &Dict) -> PDFResult<()> {
        let all_groups: Vec<Ref> = match properties.get("OCGs") {
            Some(obj) => refs_in(xref.fetch_if_ref(obj)?.deref()),
            None => Vec::new(),
        };
        let Some(config) = xref.get_resolved(properties, "D")? else {
            return Ok(());
        };
        let Some(config) = config.as_dict() else {
            return Ok(());
        };

        let base_on = config.get_name("BaseState") != Some("OFF");
        for group in &all_groups {
            self.groups.insert(group.num, base_on);
        }
        for (key, state) in [("ON", true), ("OFF", false)] {
            if let Some(obj) = config.get(key) {
                for group in refs_in(xref.fetch_if_ref(obj)?.deref()) {
                    self.groups.insert(group.num, state);
                }
            }
        }

        if let Some(rules) = xref.get_resolved(config, "AS")? {
            for rule in rules.as_array().unwrap_or(&[]) {
                let rule = xref.fetch_if_ref(rule)?;
                if let Some(rule) = rule.as_dict() {
                    self.apply_usage_rule(xref, rule)?;
                }
            }
        }
        log::debug!(
            "optional content for {:?}: {} of {} groups visible",
            self.usage,
            self.groups.values().filter(|on| **on).count(),
            self.groups.len()
        );
        Ok(())
    }

    /// Applies one `/AS` entry: for the matching event, each listed group's
    /// `/Usage` dictionary decides its state per category.
    fn apply_usage_rule(&mut self, xref: &mut XRef, rule: &Dict) -> PDFResult<()> {
        if rule.get_name("Event") != Some(self.usage.event_name()) {
            return Ok(());
        }
        let categories: Vec<String> = match rule.get("Category") {
            Some(PDFObject::Name(name)) => vec![name.clone()],
            Some(PDFObject::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_name().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };
        let groups = match rule.get("OCGs") {
            Some(obj) => refs_in(xref.fetch_if_ref(obj)?.deref()),
            None => Vec::new(),
        };

        for group in groups {
            let ocg = xref.fetch(group)?;
            let Some(ocg) = ocg.as_dict() else {
                continue;
            };
            let Some(usage) = xref.get_resolved(ocg, "Usage")? else {
                continue;
            };
            let Some(usage) = usage.as_dict() else {
                continue;
            };
            for category in &categories {
                let Some(entry) = xref.get_resolved(usage, category)? else {
                    continue;
                };
                let state_key = format!("{}State", category);
                match entry.as_dict().and_then(|d| d.get_name(&state_key)) {
                    Some("ON") => {
                        self.groups.insert(group.num, true);
                    }
                    Some("OFF") => {
                        self.groups.insert(group.num, false);
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Decides whether content tagged with `oc` (an `/OC` entry: a group or
    /// membership dictionary, usually indirect) is visible.
    pub fn check_visibility(&self, xref: &mut XRef, oc: &PDFObject) -> PDFResult<bool> {
        let resolved = xref.fetch_if_ref(oc)?;
        let Some(dict) = resolved.as_dict() else {
            return Ok(true);
        };
        match dict.get_name("Type") {
            Some("OCG") => Ok(oc.as_reference().is_none_or(|r| self.is_group_visible(r))),
            Some("OCMD") => self.check_membership(xref, dict),
            _ => Ok(true),
        }
    }

    fn check_membership(&self, xref: &mut XRef, ocmd: &Dict) -> PDFResult<bool> {
        if let Some(expression) = ocmd.get("VE") {
            let expression = xref.fetch_if_ref(expression)?.deref().clone();
            if let Some(visible) = self.evaluate_expression(xref, &expression, 0)? {
                return Ok(visible);
            }
        }

        let groups = match ocmd.get("OCGs") {
            Some(obj) => refs_in(xref.fetch_if_ref(obj)?.deref()),
            None => Vec::new(),
        };
        if groups.is_empty() {
            return Ok(true);
        }
        let states: Vec<bool> = groups.iter().map(|g| self.is_group_visible(*g)).collect();
        Ok(VisibilityPolicy::from_name(ocmd.get_name("P")).apply(&states))
    }

    /// Evaluates `[/And|/Or|/Not operands...]`. Returns `None` for malformed
    /// expressions so the caller can fall back to `/OCGs` and `/P`.
    fn evaluate_expression(
        &self,
        xref: &mut XRef,
        expression: &PDFObject,
        depth: usize,
    ) -> PDFResult<Option<bool>> {
        if depth > MAX_EXPRESSION_DEPTH {
            log::warn!("optional content expression nested too deeply");
            return Ok(None);
        }
        if let PDFObject::Ref(r) = expression {
            return Ok(Some(self.is_group_visible(*r)));
        }
        let Some(items) = expression.as_array() else {
            return Ok(None);
        };
        let Some((operator, operands)) = items.split_first() else {
            return Ok(None);
        };

        let mut values = Vec::with_capacity(operands.len());
        for operand in operands {
            let operand = match &**operand {
                PDFObject::Ref(r) => {
                    // A reference is either a group or a nested expression
                    let target = xref.fetch(*r)?;
                    if target.as_array().is_some() {
                        target.deref().clone()
                    } else {
                        PDFObject::Ref(*r)
                    }
                }
                other => other.clone(),
            };
            match self.evaluate_expression(xref, &operand, depth + 1)? {
                Some(value) => values.push(value),
                None => return Ok(None),
            }
        }

        Ok(match operator.as_name() {
            Some("And") if !values.is_empty() => Some(values.iter().all(|v| *v)),
            Some("Or") if !values.is_empty() => Some(values.iter().any(|v| *v)),
            Some("Not") if values.len() == 1 => Some(!values[0]),
            _ => None,
        })
    }
}

/// Collects group references from a single reference or an array of them.
fn refs_in(obj: &PDFObject) -> Vec<Ref> {
    match obj {
        PDFObject::Ref(r) => vec![*r],
        PDFObject::Array(items) => items.iter().filter_map(|i| i.as_reference()).collect(),
        _ => Vec::new(),
    }
}
