use serde::Serialize;

use crate::model::TextField;
use crate::model::config::Limits;
use crate::util::unicode::grapheme_count;

/// Soft length status of one text field. Limits are advisory; nothing is
/// truncated or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LengthReport {
    pub field: TextField,
    pub length: usize,
    pub limit: usize,
    /// Negative once the limit is exceeded
    pub remaining: i64,
    pub near_limit: bool,
}

impl LengthReport {
    pub fn measure(field: TextField, text: &str, limits: &Limits) -> Self {
        let limit = match field {
            TextField::Title => limits.title_soft_limit,
            TextField::Details => limits.details_soft_limit,
        };
        let length = grapheme_count(text);
        LengthReport {
            field,
            length,
            limit,
            remaining: limit as i64 - length as i64,
            near_limit: length > limit.saturating_sub(field.warn_margin()),
        }
    }

    pub fn over_limit(&self) -> bool {
        self.remaining < 0
    }
}
