//! Label generation
//!
//! Best-effort human phrases for common expression shapes, tried in
//! order: the fixed legacy alias table, ISO-8601 durations, structural
//! phrases ("Last 7 days", "This month", "Next quarter"), and finally the
//! literal expression text. Label generation is total and never errors.

use crate::expr::{alias, GrainDuration, Interval, Reduced, RillTime, Supported};
use crate::grain::Grain;

/// The display label for an expression
pub fn label_for(expr: &RillTime) -> String {
    if let Some(label) = alias::alias_label(expr.raw()) {
        return label.to_string();
    }
    if let Some(label) = alias::iso_duration_label(expr.raw()) {
        return label;
    }
    let structural = expr.interval.label(None);
    if structural.supported {
        structural.value
    } else {
        expr.to_string()
    }
}

impl Interval {
    /// A structural phrase for this interval shape
    ///
    /// Supported only when the start and end offsets reduce to exactly
    /// one grain unit and any composing `parent_offset` is not coarser
    /// than it; other shapes return the literal text with
    /// `supported == false`. The restriction is deliberate: the paired
    /// backend resolver phrases the same shapes, and both sides fall
    /// back to the literal for everything else.
    pub fn label(&self, parent_offset: Option<&GrainDuration>) -> Supported<String> {
        match self {
            Interval::AllTime => Supported::yes("All time".to_string()),
            Interval::PeriodToGrain(grain) => {
                if !parent_allows(parent_offset, *grain) {
                    return Supported::no(self.to_string());
                }
                Supported::yes(match grain {
                    Grain::Day => "Today".to_string(),
                    other => format!("{} to date", capitalize(other.period_name())),
                })
            }
            Interval::Shorthand(_) | Interval::StartEnd { .. } => {
                self.structural_label(parent_offset)
            }
            Interval::Ordinal(_) | Interval::Iso { .. } => Supported::no(self.to_string()),
        }
    }

    fn structural_label(&self, parent_offset: Option<&GrainDuration>) -> Supported<String> {
        let Some((start, end)) = self.to_start_end() else {
            return Supported::no(self.to_string());
        };
        // a snap at a different grain than the offset changes the window
        // in a way no phrase captures
        let snaps_ok = |snaps: &[Grain], grain: Grain| snaps.iter().all(|s| *s == grain);
        let phrase = match (start.offset.reduced(), end.offset.reduced()) {
            (Reduced::Single(grain, n), Reduced::Zero) if n < 0 => {
                if !parent_allows(parent_offset, grain)
                    || !snaps_ok(&start.snaps, grain)
                    || !snaps_ok(&end.snaps, grain)
                {
                    return Supported::no(self.to_string());
                }
                let count = n.unsigned_abs();
                if count == 1 && end.snaps.contains(&grain) {
                    format!("Previous {}", grain.period_name())
                } else if count == 1 {
                    format!("Last {}", grain.period_name())
                } else {
                    format!("Last {} {}s", count, grain.period_name())
                }
            }
            (Reduced::Zero, Reduced::Single(grain, n)) if n > 0 => {
                if !parent_allows(parent_offset, grain)
                    || !snaps_ok(&start.snaps, grain)
                    || !snaps_ok(&end.snaps, grain)
                {
                    return Supported::no(self.to_string());
                }
                let count = n as u64;
                if count == 1 && start.snaps.contains(&grain) {
                    match grain {
                        Grain::Day => "Today".to_string(),
                        other => format!("This {}", other.period_name()),
                    }
                } else if count == 1 {
                    format!("Next {}", grain.period_name())
                } else {
                    format!("Next {} {}s", count, grain.period_name())
                }
            }
            _ => return Supported::no(self.to_string()),
        };
        Supported::yes(phrase)
    }
}

/// True when the parent offset reduces to one unit no coarser than `unit`
fn parent_allows(parent_offset: Option<&GrainDuration>, unit: Grain) -> bool {
    match parent_offset.map(|p| p.reduced()) {
        None | Some(Reduced::Zero) => true,
        Some(Reduced::Single(grain, _)) => grain <= unit,
        Some(Reduced::Mixed) => false,
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
