// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Ground-truth capture and byte-exact output validation.

use std::sync::Arc;

use crate::types::ValidationStatus;

/// Output of the baseline, frozen after capture and shared across runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundTruth {
    bytes: Arc<[u8]>,
    checksum: u32,
}

impl GroundTruth {
    /// Copy `output` into a shared, read-only buffer.
    pub fn capture(output: &[u8]) -> Self {
        Self {
            bytes: Arc::from(output),
            checksum: crc32fast::hash(output),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// CRC32 of the captured bytes, for log lines.
    pub fn checksum(&self) -> u32 {
        self.checksum
    }
}

/// Byte-exact comparison over the ground-truth length. Differing lengths never match.
pub fn check(candidate: &[u8], truth: &GroundTruth) -> bool {
    candidate == truth.as_bytes()
}

/// Compare `candidate` against `truth` and log the outcome.
///
/// Without a ground truth there is nothing to compare against, so the
/// benchmark stays [`ValidationStatus::NotValidated`].
pub fn validate(name: &str, candidate: &[u8], truth: Option<&GroundTruth>) -> ValidationStatus {
    let Some(truth) = truth else {
        tracing::warn!(
            benchmark = name,
            "Validation requested but no baseline output was captured"
        );
        return ValidationStatus::NotValidated;
    };

    let status = ValidationStatus::from_outcome(check(candidate, truth));
    if status.is_invalid() {
        let first_mismatch = candidate
            .iter()
            .zip(truth.as_bytes())
            .position(|(a, b)| a != b);
        tracing::warn!(
            benchmark = name,
            expected_len = truth.len(),
            actual_len = candidate.len(),
            expected_crc = truth.checksum(),
            actual_crc = crc32fast::hash(candidate),
            first_mismatch = ?first_mismatch,
            "Output does not match baseline"
        );
    } else {
        tracing::debug!(benchmark = name, checksum = truth.checksum(), "Output matches baseline");
    }
    status
}
