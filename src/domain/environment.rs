//! Evaluation context: trading calendar, data catalog and operator catalog.
//!
//! The environment is the only source of range faults. Windows and shifts that
//! leave the calendar, or a series' own history, fail instead of clamping.

use crate::domain::catalog::OperatorCatalog;
use crate::domain::dimension::Dimension;
use crate::domain::error::{AlphaError, Direction, ParseError};
use crate::domain::frame::Frame;
use crate::domain::gene::Gene;
use crate::domain::node::{ArgConstraint, Node, Operator, parse_rational};
use chrono::NaiveDate;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

const XML_TAGS: [&str; 3] = ["Constant", "Data", "Operator"];

/// A named series and its declared dimension.
#[derive(Debug, Clone)]
pub struct DataEntry {
    pub frame: Frame,
    pub dimension: Dimension,
}

#[derive(Debug, Clone)]
pub struct Environment {
    calendar: Vec<NaiveDate>,
    universe: Vec<String>,
    data: BTreeMap<String, DataEntry>,
    operators: OperatorCatalog,
}

impl Environment {
    /// The calendar is sorted and deduplicated.
    pub fn new(
        calendar: impl IntoIterator<Item = NaiveDate>,
        universe: Vec<String>,
        operators: OperatorCatalog,
    ) -> Self {
        let calendar: Vec<NaiveDate> = calendar.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        Self {
            calendar,
            universe,
            data: BTreeMap::new(),
            operators,
        }
    }

    /// An environment whose operator catalog is the default library.
    pub fn with_default_operators(
        calendar: impl IntoIterator<Item = NaiveDate>,
        universe: Vec<String>,
    ) -> Self {
        Self::new(calendar, universe, OperatorCatalog::with_defaults())
    }

    pub fn calendar(&self) -> &[NaiveDate] {
        &self.calendar
    }

    pub fn universe(&self) -> &[String] {
        &self.universe
    }

    pub fn operators(&self) -> &OperatorCatalog {
        &self.operators
    }

    pub fn data(&self, name: &str) -> Option<&DataEntry> {
        self.data.get(name)
    }

    pub fn data_names(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn data_entries(&self) -> impl Iterator<Item = (&str, &DataEntry)> {
        self.data.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Register a series.
    ///
    /// Its columns must be the universe. It is re-indexed onto the calendar
    /// dates within its own first and last date; calendar dates the series
    /// lacks read as `NaN`.
    pub fn add_data(
        &mut self,
        name: &str,
        frame: Frame,
        dimension: Dimension,
    ) -> Result<(), AlphaError> {
        if self.data.contains_key(name) {
            return Err(AlphaError::Duplicate {
                kind: "data series",
                name: name.to_string(),
            });
        }
        if frame.columns() != self.universe.as_slice() {
            return Err(AlphaError::Data {
                reason: format!(
                    "series '{}' has columns {}, expected {}",
                    name,
                    frame.columns().join(","),
                    self.universe.join(",")
                ),
            });
        }
        let (Some(first), Some(last)) = (frame.first_date(), frame.last_date()) else {
            return Err(AlphaError::Data {
                reason: format!("series '{}' is empty", name),
            });
        };
        let start = self.calendar.partition_point(|d| *d < first);
        let end = self.calendar.partition_point(|d| *d <= last);
        if start >= end {
            return Err(AlphaError::Data {
                reason: format!("series '{}' has no dates in the calendar", name),
            });
        }
        let frame = frame.reindex(&self.calendar[start..end]);
        debug!(series = name, rows = frame.len(), dimension = %dimension, "added data series");
        self.data
            .insert(name.to_string(), DataEntry { frame, dimension });
        Ok(())
    }

    pub fn add_operator(&mut self, operator: Operator) -> Result<(), AlphaError> {
        self.operators.register(operator)
    }

    /// Replace the constraint on argument `index` of operator `name`.
    pub fn constrain(
        &mut self,
        name: &str,
        index: usize,
        constraint: ArgConstraint,
    ) -> Result<(), AlphaError> {
        self.operators.constrain(name, index, constraint)
    }

    fn calendar_position(&self, date: NaiveDate) -> Result<usize, AlphaError> {
        self.calendar
            .binary_search(&date)
            .map_err(|_| AlphaError::DateOutOfRange { date })
    }

    fn check_in_calendar(&self, date: NaiveDate) -> Result<(), AlphaError> {
        match (self.calendar.first(), self.calendar.last()) {
            (Some(first), Some(last)) if *first <= date && date <= *last => Ok(()),
            _ => Err(AlphaError::DateOutOfRange { date }),
        }
    }

    /// A frame holding `value` on every calendar date in `[date1, date2]`.
    pub fn constant_frame(
        &self,
        value: f64,
        date1: NaiveDate,
        date2: NaiveDate,
    ) -> Result<Frame, AlphaError> {
        self.check_in_calendar(date1)?;
        self.check_in_calendar(date2)?;
        let start = self.calendar.partition_point(|d| *d < date1);
        let end = self.calendar.partition_point(|d| *d <= date2).max(start);
        Ok(Frame::filled(&self.calendar[start..end], &self.universe, value))
    }

    /// Window `[date1, date2]` of a series.
    ///
    /// Both bounds must lie within the series' own dates.
    pub fn get_frame(
        &self,
        series: &str,
        date1: NaiveDate,
        date2: NaiveDate,
    ) -> Result<Frame, AlphaError> {
        let entry = self
            .data
            .get(series)
            .ok_or_else(|| AlphaError::UnknownSeries(series.to_string()))?;
        let covered = match (entry.frame.first_date(), entry.frame.last_date()) {
            (Some(first), Some(last)) => first <= date1 && date2 <= last,
            _ => false,
        };
        if !covered {
            return Err(AlphaError::WindowOutOfRange {
                series: series.to_string(),
                start: date1,
                end: date2,
            });
        }
        Ok(entry.frame.between(date1, date2))
    }

    /// Move `offset` trading days from `date`.
    ///
    /// A date missing from the calendar first rounds to the nearest trading
    /// date at or before it (backward) or at or after it (forward).
    pub fn shift_date(
        &self,
        date: NaiveDate,
        offset: usize,
        direction: Direction,
    ) -> Result<NaiveDate, AlphaError> {
        let out_of_range = || AlphaError::ShiftOutOfRange {
            date,
            offset,
            direction,
        };
        let target = match direction {
            Direction::Backward => {
                let at_or_before = self.calendar.partition_point(|d| *d <= date);
                at_or_before
                    .checked_sub(1)
                    .and_then(|position| position.checked_sub(offset))
            }
            Direction::Forward => {
                let at_or_after = self.calendar.partition_point(|d| *d < date);
                at_or_after
                    .checked_add(offset)
                    .filter(|position| *position < self.calendar.len())
            }
        };
        target
            .map(|position| self.calendar[position])
            .ok_or_else(out_of_range)
    }

    /// Number of trading days from `date1` to `date2`; both must be trading days.
    pub fn trading_days_between(
        &self,
        date1: NaiveDate,
        date2: NaiveDate,
    ) -> Result<usize, AlphaError> {
        let start = self.calendar_position(date1)?;
        let end = self.calendar_position(date2)?;
        Ok(end.saturating_sub(start))
    }

    /// Resolve a token to a node: a rational literal first, then a data
    /// series, then an operator.
    pub fn create_node(&self, name: &str) -> Result<Node, AlphaError> {
        if let Some(value) = parse_rational(name) {
            return Ok(Node::Constant(value));
        }
        if let Some(entry) = self.data.get(name) {
            return Ok(Node::data(name, entry.dimension.clone()));
        }
        if let Some(operator) = self.operators.instantiate(name) {
            return Ok(Node::Operator(operator));
        }
        Err(AlphaError::UnknownNode(name.to_string()))
    }

    /// Parse `name(arg, arg, ...)` notation.
    ///
    /// Parentheses and commas only separate tokens; the tree shape comes from
    /// each operator's arity, so the result may still fail validation.
    pub fn parse_string(&self, text: &str) -> Result<Gene, AlphaError> {
        let mut nodes = Vec::new();
        for (position, token) in tokenize(text) {
            let node = self.create_node(token).map_err(|err| match err {
                AlphaError::UnknownNode(name) => AlphaError::Parse(ParseError {
                    message: format!("unknown token '{}'", name),
                    position,
                }),
                other => other,
            })?;
            nodes.push(node);
        }
        if nodes.is_empty() {
            return Err(ParseError {
                message: "empty expression".into(),
                position: 0,
            }
            .into());
        }
        let gene = Gene::new(nodes);
        debug!(input = text, gene = %gene, "parsed expression");
        Ok(gene)
    }

    /// Parse the XML form produced by `Gene::to_xml_string`.
    pub fn parse_xmlstring(&self, xml: &str) -> Result<Gene, AlphaError> {
        let mut reader = Reader::from_str(xml);
        let mut nodes = Vec::new();
        loop {
            let event = reader.read_event().map_err(|err| AlphaError::Xml {
                reason: format!("at byte {}: {}", reader.buffer_position(), err),
            })?;
            match event {
                Event::Start(element) | Event::Empty(element) => {
                    nodes.push(self.xml_node(&element)?);
                }
                Event::Eof => break,
                _ => {}
            }
        }
        if nodes.is_empty() {
            return Err(AlphaError::Xml {
                reason: "document holds no nodes".into(),
            });
        }
        let gene = Gene::new(nodes);
        debug!(gene = %gene, "parsed xml expression");
        Ok(gene)
    }

    fn xml_node(&self, element: &BytesStart<'_>) -> Result<Node, AlphaError> {
        let tag = String::from_utf8_lossy(element.name().as_ref()).into_owned();
        if !XML_TAGS.contains(&tag.as_str()) {
            return Err(AlphaError::Xml {
                reason: format!("unexpected element <{}>", tag),
            });
        }
        let attribute = element
            .try_get_attribute("value")
            .map_err(|err| AlphaError::Xml {
                reason: format!("<{}>: {}", tag, err),
            })?
            .ok_or_else(|| AlphaError::Xml {
                reason: format!("<{}> has no value attribute", tag),
            })?;
        let value = attribute.unescape_value().map_err(|err| AlphaError::Xml {
            reason: format!("<{}>: {}", tag, err),
        })?;
        self.create_node(&value)
    }
}

/// Split on whitespace, parentheses and commas, keeping byte offsets.
fn tokenize(text: &str) -> Vec<(usize, &str)> {
    let mut tokens = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        let separator = c.is_whitespace() || matches!(c, '(' | ')' | ',');
        match (separator, start) {
            (true, Some(s)) => {
                tokens.push((s, &text[s..i]));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        tokens.push((s, &text[s..]));
    }
    tokens
}
