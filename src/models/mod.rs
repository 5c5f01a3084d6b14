// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

mod job;
mod result;
mod scan_config;
pub mod scanner;
mod status;

pub use job::*;
pub use result::*;
pub use scan_config::*;
pub use status::*;
