//! Input checks performed before any binding call.

use chrono::{DateTime, Utc};

use mt5_core::{HistoryFilter, ValidationError};

pub fn positive_count(count: i64) -> Result<usize, ValidationError> {
    if count <= 0 {
        return Err(ValidationError::NonPositiveCount(count));
    }
    Ok(count as usize)
}

pub fn non_negative_position(start_pos: i64) -> Result<usize, ValidationError> {
    if start_pos < 0 {
        return Err(ValidationError::NegativePosition(start_pos));
    }
    Ok(start_pos as usize)
}

pub fn date_range(date_from: DateTime<Utc>, date_to: DateTime<Utc>) -> Result<(), ValidationError> {
    if date_from >= date_to {
        return Err(ValidationError::InvalidDateRange {
            from: date_from.to_string(),
            to: date_to.to_string(),
        });
    }
    Ok(())
}

/// `name` appears in the message (`price_*` names read as "Price").
pub fn positive_value(value: f64, name: &str) -> Result<(), ValidationError> {
    if value <= 0.0 || value.is_nan() {
        return Err(ValidationError::NonPositiveValue {
            name: name.to_string(),
            value,
        });
    }
    Ok(())
}

/// Selection for history queries.
///
/// `ticket` wins over `position`, which wins over the date range. `symbol`
/// becomes the group pattern `*{symbol}*` and replaces `group`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub group: Option<String>,
    pub symbol: Option<String>,
    pub ticket: Option<i64>,
    pub position: Option<i64>,
}

impl HistoryQuery {
    pub fn range(date_from: DateTime<Utc>, date_to: DateTime<Utc>) -> Self {
        Self {
            date_from: Some(date_from),
            date_to: Some(date_to),
            ..Self::default()
        }
    }

    pub fn ticket(ticket: i64) -> Self {
        Self {
            ticket: Some(ticket),
            ..Self::default()
        }
    }

    pub fn position(position: i64) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Resolve into the single filter the terminal receives.
    pub fn to_filter(&self) -> Result<HistoryFilter, ValidationError> {
        if let Some(ticket) = self.ticket {
            return Ok(HistoryFilter::Ticket(ticket));
        }
        if let Some(position) = self.position {
            return Ok(HistoryFilter::Position(position));
        }
        let (Some(from), Some(to)) = (self.date_from, self.date_to) else {
            return Err(ValidationError::MissingDateRange);
        };
        date_range(from, to)?;
        let group = match &self.symbol {
            Some(symbol) => Some(format!("*{symbol}*")),
            None => self.group.clone(),
        };
        Ok(HistoryFilter::Range { from, to, group })
    }
}
