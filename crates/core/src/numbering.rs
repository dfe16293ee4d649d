//! Sequential, human-readable document numbers scoped by calendar day.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Order,
    Purchase,
    Quotation,
}

impl DocumentKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Order => "POZ",
            Self::Purchase => "ORD",
            Self::Quotation => "COT",
        }
    }

    /// Zero-pad width of the per-day sequence.
    pub fn pad_width(&self) -> usize {
        match self {
            Self::Order | Self::Purchase => 3,
            Self::Quotation => 4,
        }
    }
}

/// Build the next document number for `date` given how many documents of
/// this kind were already created on that date.
///
/// Two writers racing within the same day can observe the same count and
/// produce the same number. That race is accepted: the number column carries
/// a unique index and the persistence layer re-counts and retries on
/// conflict. Callers must pass a count observed under the same date scope.
pub fn next_number(kind: DocumentKind, date: NaiveDate, created_so_far: u32) -> String {
    format!(
        "{prefix}{date}{sequence:0width$}",
        prefix = kind.prefix(),
        date = date.format("%Y%m%d"),
        sequence = created_so_far + 1,
        width = kind.pad_width(),
    )
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{next_number, DocumentKind};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 29).expect("valid date")
    }

    #[test]
    fn first_quotation_of_the_day_is_sequence_one() {
        assert_eq!(next_number(DocumentKind::Quotation, date(), 0), "COT202508290001");
    }

    #[test]
    fn orders_and_purchases_pad_to_three_digits() {
        assert_eq!(next_number(DocumentKind::Order, date(), 0), "POZ20250829001");
        assert_eq!(next_number(DocumentKind::Purchase, date(), 41), "ORD20250829042");
    }

    #[test]
    fn sequence_overflows_pad_width_without_truncation() {
        assert_eq!(next_number(DocumentKind::Order, date(), 999), "POZ202508291000");
    }

    #[test]
    fn count_type_matches_persisted_row_counts() {
        // Repositories count same-day rows into a u32 and pass it through
        // unconverted.
        let created_so_far: u32 = 12;
        assert_eq!(next_number(DocumentKind::Purchase, date(), created_so_far), "ORD20250829013");
    }

    #[test]
    fn date_scope_is_embedded_in_the_number() {
        let other = NaiveDate::from_ymd_opt(2026, 1, 2).expect("valid date");
        assert_eq!(next_number(DocumentKind::Quotation, other, 7), "COT202601020008");
    }
}
