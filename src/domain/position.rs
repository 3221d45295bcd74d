//! Open buy lots.

use chrono::NaiveDate;

/// One open lot on the ladder.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub entry_price: f64,
    pub entry_date: NaiveDate,
    pub invested_amount: f64,
}

impl Position {
    pub fn open(entry_price: f64, entry_date: NaiveDate, invested_amount: f64) -> Self {
        Position {
            entry_price,
            entry_date,
            invested_amount,
        }
    }
}

/// LIFO stack of open lots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionStack {
    lots: Vec<Position>,
}

impl PositionStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, position: Position) {
        self.lots.push(position);
    }

    /// Most recently opened lot, if any.
    pub fn pop(&mut self) -> Option<Position> {
        self.lots.pop()
    }

    pub fn drain_all(&mut self) -> Vec<Position> {
        let mut drained: Vec<Position> = self.lots.drain(..).collect();
        drained.reverse();
        drained
    }

    pub fn top(&self) -> Option<&Position> {
        self.lots.last()
    }

    pub fn len(&self) -> usize {
        self.lots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Position> {
        self.lots.iter()
    }
}
