// ABOUTME: The persisted payload of a checkpoint record: the signed checkpoint and its range proof.
// ABOUTME: Both fields are opaque bytes; the store never parses or orders them.

/// Latest stored state for one (region, log) pair.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogState {
    pub checkpoint: Vec<u8>,
    pub range: Vec<u8>,
}

impl LogState {
    pub fn new(checkpoint: impl Into<Vec<u8>>, range: impl Into<Vec<u8>>) -> Self {
        Self {
            checkpoint: checkpoint.into(),
            range: range.into(),
        }
    }

    /// Split into `(checkpoint, range)`.
    pub fn into_parts(self) -> (Vec<u8>, Vec<u8>) {
        (self.checkpoint, self.range)
    }

    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        // NULL payload columns read back as empty.
        let checkpoint: Option<Vec<u8>> = row.get(0)?;
        let range: Option<Vec<u8>> = row.get(1)?;
        Ok(Self {
            checkpoint: checkpoint.unwrap_or_default(),
            range: range.unwrap_or_default(),
        })
    }
}

