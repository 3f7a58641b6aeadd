//! Series access port trait.

use crate::domain::error::AlphaError;
use crate::domain::frame::Frame;

pub trait SeriesPort {
    /// Load a whole series: one row per date, one column per instrument.
    fn load_series(&self, name: &str) -> Result<Frame, AlphaError>;

    fn list_series(&self) -> Result<Vec<String>, AlphaError>;
}
