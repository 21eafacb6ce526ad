use sketch_shared::{simplify, Stroke, TimedPoint};

use crate::error::StoreError;

/// Identifies the stroke currently being drawn. A handle goes stale once
/// its stroke is committed or the store is cleared.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StrokeHandle(u64);

struct InProgress {
    handle: StrokeHandle,
    points: Vec<TimedPoint>,
}

/// Committed strokes plus the count of leading strokes already handed to
/// the transport. `sent <= strokes.len()` always holds.
#[derive(Default)]
pub struct StrokeStore {
    strokes: Vec<Stroke>,
    sent: usize,
    current: Option<InProgress>,
    next_handle: u64,
}

impl StrokeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new in-progress stroke, dropping any unfinished one.
    pub fn begin_stroke(&mut self, point: TimedPoint) -> StrokeHandle {
        let handle = StrokeHandle(self.next_handle);
        self.next_handle += 1;
        self.current = Some(InProgress {
            handle,
            points: vec![point],
        });
        handle
    }

    pub fn append_to_current(
        &mut self,
        handle: StrokeHandle,
        point: TimedPoint,
    ) -> Result<(), StoreError> {
        let current = self.in_progress(handle)?;
        current.points.push(point);
        Ok(())
    }

    /// Simplifies the in-progress stroke and appends it to the committed
    /// sequence. Returns the index of the new stroke.
    pub fn commit_current(&mut self, handle: StrokeHandle) -> Result<usize, StoreError> {
        self.in_progress(handle)?;
        let Some(current) = self.current.take() else {
            return Err(StoreError::InvalidHandle);
        };
        self.strokes.push(Stroke {
            points: simplify(&current.points),
        });
        Ok(self.strokes.len() - 1)
    }

    /// Removes the newest stroke unless it has already been sent.
    pub fn undo(&mut self) -> Option<Stroke> {
        if self.strokes.len() > self.sent {
            self.strokes.pop()
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.strokes.clear();
        self.sent = 0;
        self.current = None;
    }

    pub fn unsent_suffix(&self) -> &[Stroke] {
        &self.strokes[self.sent..]
    }

    pub fn has_unsent(&self) -> bool {
        !self.unsent_suffix().is_empty()
    }

    pub fn mark_sent(&mut self) {
        self.sent = self.strokes.len();
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn sent(&self) -> usize {
        self.sent
    }

    pub fn current(&self) -> Option<&[TimedPoint]> {
        self.current.as_ref().map(|current| current.points.as_slice())
    }

    /// The in-progress stroke is not counted.
    pub fn marker_hue(&self, index: usize) -> Option<f64> {
        if index >= self.strokes.len() {
            return None;
        }
        Some(index as f64 / self.strokes.len() as f64)
    }

    fn in_progress(&mut self, handle: StrokeHandle) -> Result<&mut InProgress, StoreError> {
        match self.current.as_mut() {
            Some(current) if current.handle == handle => Ok(current),
            _ => Err(StoreError::InvalidHandle),
        }
    }
}
