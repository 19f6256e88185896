//! Image path fixtures for integration tests

/// A batch that processes cleanly.
pub const CLEAN_BATCH: &[&str] = &[
    "uploads/portrait.jpg",
    "uploads/landscape.png",
    "uploads/product.webp",
];

/// A batch mixing permanent failures and a transient one.
pub const MIXED_BATCH: &[&str] = &[
    "uploads/good-1.png",
    "uploads/bad-corrupt.png",
    "uploads/flaky-timeout.png",
    "uploads/good-2.png",
];
