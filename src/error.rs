// flowwatch - network flow anomaly detector
// Copyright (C) 2025 Laurence Oberman <loberman@redhat.com>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::fmt;

/// Fatal configuration problems: bad CLI values or a derived `intvl_max` too small.
/// Reported to stderr with the `Error: ` tag and exit code 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidOption(String),
    MissingValue(char),
    InvalidValue { opt: char, reason: String },
    MissingFile,
    WindowTooShort,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidOption(opt) => write!(f, "Unknown option '{opt}'."),
            ConfigError::MissingValue(opt) => write!(f, "Option -{opt} requires a value."),
            ConfigError::InvalidValue { opt, reason } => {
                write!(f, "Invalid value for -{opt}: {reason}.")
            }
            ConfigError::MissingFile => write!(f, "You must specify a data file."),
            ConfigError::WindowTooShort => write!(
                f,
                "Time window cannot be less or closely equal than observation interval."
            ),
        }
    }
}
