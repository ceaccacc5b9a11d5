//! Unit tests for report rendering.

#![expect(
    clippy::expect_used,
    reason = "Test code uses expect for assertion clarity"
)]
