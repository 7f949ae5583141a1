//! Flat f64 encoding of partial results for cross-rank exchange

use crate::error::{Error, Result};

/// Appends fields to a flat f64 vector
///
/// Counts are stored as f64, exact below 2^53.
#[derive(Debug, Default)]
pub struct FlatWriter {
    data: Vec<f64>,
}

impl FlatWriter {
    /// Start an encoding with a format tag
    pub fn new(tag: u32) -> Self {
        Self {
            data: vec![f64::from(tag)],
        }
    }

    /// Append a count
    pub fn push_count(&mut self, value: u64) -> &mut Self {
        self.data.push(value as f64);
        self
    }

    /// Append a scalar
    pub fn push(&mut self, value: f64) -> &mut Self {
        self.data.push(value);
        self
    }

    /// Append a length-prefixed slice
    pub fn push_slice(&mut self, values: &[f64]) -> &mut Self {
        self.data.push(values.len() as f64);
        self.data.extend_from_slice(values);
        self
    }

    /// The encoded values
    pub fn finish(&mut self) -> Vec<f64> {
        std::mem::take(&mut self.data)
    }
}

/// Reads fields written by [`FlatWriter`] in the same order
#[derive(Debug)]
pub struct FlatReader<'a> {
    data: &'a [f64],
    pos: usize,
}

impl<'a> FlatReader<'a> {
    /// Start decoding, checking the format tag
    pub fn new(data: &'a [f64], tag: u32) -> Result<Self> {
        let mut reader = Self { data, pos: 0 };
        let found = reader.read()?;
        if found != f64::from(tag) {
            return Err(Error::Communication(format!(
                "expected partial result tag {tag}, found {found}"
            )));
        }
        Ok(reader)
    }

    /// Next scalar
    pub fn read(&mut self) -> Result<f64> {
        let value = self
            .data
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.truncated())?;
        self.pos += 1;
        Ok(value)
    }

    /// Next count
    pub fn read_count(&mut self) -> Result<u64> {
        let value = self.read()?;
        if value < 0.0 || value.fract() != 0.0 {
            return Err(Error::Communication(format!("{value} is not a count")));
        }
        Ok(value as u64)
    }

    /// Next length-prefixed slice
    pub fn read_slice(&mut self) -> Result<&'a [f64]> {
        let len = self.read_count()? as usize;
        let end = self.pos.checked_add(len).ok_or_else(|| self.truncated())?;
        let values = self.data.get(self.pos..end).ok_or_else(|| self.truncated())?;
        self.pos = end;
        Ok(values)
    }

    /// Check that every value was consumed
    pub fn finish(self) -> Result<()> {
        if self.pos != self.data.len() {
            return Err(Error::Communication(format!(
                "{} trailing values in partial result",
                self.data.len() - self.pos
            )));
        }
        Ok(())
    }

    fn truncated(&self) -> Error {
        Error::Communication(format!(
            "partial result truncated after {} values",
            self.data.len()
        ))
    }
}
