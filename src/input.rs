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

//! Line-oriented input source. The original tool forked a child process and read
//! its stdout through a pipe; that fork/execl dance is an implementation artifact
//! of its era and is replaced here with a direct file-or-stdin reader, same as the
//! `BufReader` the rest of this crate family reaches for.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Stdin};

pub enum LineSource {
    File(BufReader<File>),
    Stdin(Stdin),
}

impl LineSource {
    pub fn open(path: &str) -> io::Result<Self> {
        if path == "-" {
            Ok(LineSource::Stdin(io::stdin()))
        } else {
            let file = File::open(path)?;
            Ok(LineSource::File(BufReader::new(file)))
        }
    }

    /// Reads the next line, without its trailing newline. `Ok(None)` at EOF.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = String::new();
        let n = match self {
            LineSource::File(reader) => reader.read_line(&mut buf)?,
            LineSource::Stdin(stdin) => stdin.lock().read_line(&mut buf)?,
        };
        if n == 0 {
            Ok(None)
        } else {
            Ok(Some(buf))
        }
    }
}
