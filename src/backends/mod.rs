// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for camera sources
//!
//! # Modules
//!
//! - [`camera`]: Camera source trait, its variants, and the connection and
//!   frame delivery machinery they share

pub mod camera;
