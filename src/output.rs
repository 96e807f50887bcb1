//! The live output sink that rendered operations are mounted into.
//!
//! Every mounted operation gets a [`Marker`]. Markers never go stale when
//! other segments are inserted or removed; they are resolved to a position
//! when used.

use crate::error::{UnreplError, UnreplResult};
use crate::render::RenderOp;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Marker(pub u64);

#[derive(Debug, Clone, PartialEq)]
struct Segment {
    marker: Marker,
    op: RenderOp,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutputBuffer {
    segments: Vec<Segment>,
    next_marker: u64,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn segments_for(&mut self, ops: Vec<RenderOp>) -> Vec<Segment> {
        ops.into_iter()
            .map(|op| {
                let marker = Marker(self.next_marker);
                self.next_marker = self.next_marker.wrapping_add(1);
                Segment { marker, op }
            })
            .collect()
    }

    /// Appends `ops` at the end, returning their markers.
    pub fn append(&mut self, ops: Vec<RenderOp>) -> Vec<Marker> {
        let segments = self.segments_for(ops);
        let markers = segments.iter().map(|s| s.marker).collect();
        self.segments.extend(segments);
        markers
    }

    /// Current index of the segment behind `marker`.
    pub fn position(&self, marker: Marker) -> Option<usize> {
        self.segments.iter().position(|s| s.marker == marker)
    }

    /// Current byte offset of the segment behind `marker` in [`Self::text`].
    pub fn offset(&self, marker: Marker) -> Option<usize> {
        let index = self.position(marker)?;
        Some(
            self.segments
                .iter()
                .take(index)
                .map(|s| s.op.text().len())
                .sum(),
        )
    }

    pub fn get(&self, marker: Marker) -> Option<&RenderOp> {
        self.segments
            .iter()
            .find(|s| s.marker == marker)
            .map(|s| &s.op)
    }

    /// Replaces the segment behind `marker` with `ops`.
    ///
    /// # Errors
    /// [`UnreplError::UnknownMarker`] if the segment is gone.
    pub fn replace(&mut self, marker: Marker, ops: Vec<RenderOp>) -> UnreplResult<Vec<Marker>> {
        let index = self.position(marker).ok_or(UnreplError::UnknownMarker)?;
        Ok(self.splice(index, index.saturating_add(1), ops))
    }

    /// Inserts `ops` right after the segment behind `marker`.
    ///
    /// # Errors
    /// [`UnreplError::UnknownMarker`] if the segment is gone.
    pub fn insert_after(&mut self, marker: Marker, ops: Vec<RenderOp>) -> UnreplResult<Vec<Marker>> {
        let index = self
            .position(marker)
            .ok_or(UnreplError::UnknownMarker)?
            .saturating_add(1);
        Ok(self.splice(index, index, ops))
    }

    /// Removes the segment behind `marker`.
    ///
    /// # Errors
    /// [`UnreplError::UnknownMarker`] if the segment is gone.
    pub fn remove(&mut self, marker: Marker) -> UnreplResult<RenderOp> {
        let index = self.position(marker).ok_or(UnreplError::UnknownMarker)?;
        Ok(self.segments.remove(index).op)
    }

    fn splice(&mut self, start: usize, end: usize, ops: Vec<RenderOp>) -> Vec<Marker> {
        let segments = self.segments_for(ops);
        let markers = segments.iter().map(|s| s.marker).collect();
        self.segments.splice(start..end, segments).for_each(drop);
        markers
    }

    pub fn ops(&self) -> impl Iterator<Item = (Marker, &RenderOp)> {
        self.segments.iter().map(|s| (s.marker, &s.op))
    }

    pub fn text(&self) -> String {
        self.segments.iter().map(|s| s.op.text()).collect()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }
}
