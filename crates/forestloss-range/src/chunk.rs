//! Chunk boundaries that never split a species.

use forestloss_common::SisId;

use crate::{RangeError, Result};

/// How much of a chunk is processed now and what is deferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkCut {
    /// Rows processed in this chunk, counted from its start.
    pub retained: usize,
    /// Whether this chunk reaches the end of the source.
    pub is_final: bool,
    /// Species whose trailing records were deferred to the next chunk.
    pub deferred: Option<SisId>,
}

/// Decide how many rows of the chunk starting at `start` to keep.
///
/// `sisids` are the species ids of the rows read for the chunk, in row order,
/// and `next` is the id of the first row after the chunk, if any.
/// A chunk is final when no more than `chunk_size` rows remain. Otherwise
/// every record of the chunk's last species is deferred to the next chunk,
/// which then starts at `start + retained`.
///
/// A chunk holding a single species is kept whole when `next` belongs to a
/// different species: the run is exactly `chunk_size` rows long and ends at
/// the boundary.
pub fn cut_chunk(
    sisids: &[SisId],
    next: Option<SisId>,
    start: usize,
    total_rows: usize,
    chunk_size: usize,
) -> Result<ChunkCut> {
    if chunk_size == 0 {
        return Err(RangeError::InvalidChunkSize);
    }

    let is_final = total_rows.saturating_sub(start) <= chunk_size;
    let Some(&last) = sisids.last().filter(|_| !is_final) else {
        return Ok(ChunkCut {
            retained: sisids.len(),
            is_final,
            deferred: None,
        });
    };

    let trailing = sisids.iter().rev().take_while(|&&id| id == last).count();
    let retained = sisids.len() - trailing;

    if let Some(row) = sisids[..retained].iter().position(|&id| id == last) {
        return Err(RangeError::InputFormat(format!(
            "rows {start}..{}: species {last} appears at row {} and again at row {} \
             with other species in between; the source must be grouped by species",
            start + sisids.len(),
            start + row,
            start + retained,
        )));
    }

    if retained == 0 {
        if next != Some(last) {
            return Ok(ChunkCut {
                retained: sisids.len(),
                is_final,
                deferred: None,
            });
        }
        return Err(RangeError::ResumabilityGap {
            start,
            end: start + sisids.len(),
            sisid: last,
        });
    }

    Ok(ChunkCut {
        retained,
        is_final,
        deferred: Some(last),
    })
}
