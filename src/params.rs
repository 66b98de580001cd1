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

//! Command-line parameter parsing for flowwatch.
//!
//! Option letters are preserved exactly from the original tool for compatibility:
//! `-d -e -f -h -H -k -L -M -N -p -t -w`. No `clap` — the whole crate family this
//! tool is modeled on hand-rolls its argument parsing the same way.

use crate::consts::*;
use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct Params {
    pub mode: u32,
    pub clusters: u32,
    pub flush_iter: u32,
    pub progress: u64,
    pub level: u8,
    pub interval: u64,
    pub time_window: u64,
    pub ver_threshold: u32,
    pub hor_threshold: u32,
    pub file: Option<String>,
    pub intvl_max: usize,
    pub iter_max: u64,
    /// Set when `-h`/`-H` was given; caller should print usage and exit 0.
    pub help: bool,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            mode: MODE_SYN_FLOODING,
            clusters: CLUSTERS_DEFAULT,
            flush_iter: FLUSH_ITER_DEFAULT,
            progress: 0,
            level: VERBOSITY_DEFAULT,
            interval: INTERVAL_DEFAULT,
            time_window: TIME_WINDOW_DEFAULT,
            ver_threshold: VER_THRESHOLD_DEFAULT,
            hor_threshold: HOR_THRESHOLD_DEFAULT,
            file: None,
            intvl_max: 0,
            iter_max: 0,
            help: false,
        }
    }
}

pub const USAGE: &str = "\
flowwatch - DDoS Detection
Module for detecting and analyzing potential DDoS attacks in computer networks.

Special parameters:
  -d NUM       Set the mode bit of DDoS detection, SYN flooding by default.
  -e NUM       Set the number of iterations to flush the graph, 0 by default.
  -f PATH      Set the path of the flow record file to be examined.
  -k NUM       Set the number of clusters used by k-means algorithm, 2 by default.
  -L LEVEL     Print graphs based on given verbosity level, range 1 to 5.
  -M LIMIT     Set the threshold for vertical port scan attack, 8192 by default.
  -N LIMIT     Set the threshold for horizontal port scan attack, 4096 by default.
  -p NUM       Show progress - print a dot every N flows.
  -t TIME      Set the observation interval in seconds, 1 minute by default.
  -w TIME      Set the observation time window in seconds, 1 hour by default.

Detection modes:
   1) SYN flooding detection only.
   2) Vertical port scanning detection only.
   3) SYN flooding and vertical port scanning detection.
   4) Horizontal port scanning detection only.
   5) SYN flooding and horizontal port scanning detection.
   6) Vertical and horizontal port scanning detection.
   7) All detections combined.

K-means parameters:
   - Number of clusters can be assigned between 2 and 255.
";

impl Params {
    /// Parses `argv[1..]` into a validated `Params`. Mirrors the original tool's
    /// `parse_params`: each option is handled independently (no fallthrough), and
    /// `-h`/`-H` short-circuit with `help = true` before file/window validation runs.
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Params, ConfigError> {
        let mut params = Params::default();
        let mut iter = args.into_iter().peekable();

        while let Some(arg) = iter.next() {
            if arg == "-h" || arg == "-H" {
                params.help = true;
                return Ok(params);
            }
            if !arg.starts_with('-') || arg.len() != 2 {
                return Err(ConfigError::InvalidOption(arg));
            }
            let opt = arg.as_bytes()[1] as char;
            let value = iter
                .next()
                .ok_or(ConfigError::MissingValue(opt))?;

            match opt {
                'd' => {
                    let mode: u32 = parse_num(opt, &value)?;
                    if mode < 1 || mode > MODE_ALL {
                        return Err(ConfigError::InvalidValue {
                            opt,
                            reason: "invalid detection mode number".into(),
                        });
                    }
                    params.mode = mode;
                }
                'e' => {
                    let flush_iter: u32 = parse_num(opt, &value)?;
                    params.flush_iter = flush_iter;
                }
                'f' => {
                    params.file = Some(value);
                }
                'k' => {
                    let clusters: u32 = parse_num(opt, &value)?;
                    if clusters < CLUSTERS_MIN || clusters > CLUSTERS_MAX {
                        return Err(ConfigError::InvalidValue {
                            opt,
                            reason: "number of clusters must be between 2 and 255".into(),
                        });
                    }
                    params.clusters = clusters;
                }
                'L' => {
                    let level: u8 = parse_num(opt, &value)?;
                    if level < 1 || level > VERBOSITY_MAX {
                        return Err(ConfigError::InvalidValue {
                            opt,
                            reason: "verbosity level must be between 1 and 5".into(),
                        });
                    }
                    params.level = level;
                }
                'M' => {
                    let ver_threshold: u32 = parse_num(opt, &value)?;
                    params.ver_threshold = ver_threshold;
                }
                'N' => {
                    let hor_threshold: u32 = parse_num(opt, &value)?;
                    params.hor_threshold = hor_threshold;
                }
                'p' => {
                    let progress: u64 = parse_num(opt, &value)?;
                    params.progress = progress;
                }
                't' => {
                    let interval: u64 = parse_num(opt, &value)?;
                    if interval == 0 {
                        return Err(ConfigError::InvalidValue {
                            opt,
                            reason: "observation interval must be positive".into(),
                        });
                    }
                    params.interval = interval;
                }
                'w' => {
                    let time_window: u64 = parse_num(opt, &value)?;
                    if time_window == 0 {
                        return Err(ConfigError::InvalidValue {
                            opt,
                            reason: "time window must be positive".into(),
                        });
                    }
                    params.time_window = time_window;
                }
                other => return Err(ConfigError::InvalidOption(format!("-{other}"))),
            }
        }

        if params.file.is_none() {
            return Err(ConfigError::MissingFile);
        }

        params.intvl_max = (params.time_window / params.interval) as usize + ARRAY_EXTRA;
        if params.intvl_max <= ARRAY_MIN {
            return Err(ConfigError::WindowTooShort);
        }
        params.iter_max = PORT_WINDOW_DEFAULT / params.interval;

        Ok(params)
    }

    pub fn mode_has(&self, bit: u32) -> bool {
        self.mode & bit == bit
    }
}

fn parse_num<T: std::str::FromStr>(opt: char, value: &str) -> Result<T, ConfigError> {
    value.parse::<T>().map_err(|_| ConfigError::InvalidValue {
        opt,
        reason: format!("'{value}' is not a valid number"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_and_required_file() {
        let err = Params::parse(args(&[])).unwrap_err();
        assert_eq!(err, ConfigError::MissingFile);
    }

    #[test]
    fn minimal_valid() {
        let p = Params::parse(args(&["-f", "flows.dat"])).unwrap();
        assert_eq!(p.file.as_deref(), Some("flows.dat"));
        assert_eq!(p.mode, MODE_SYN_FLOODING);
        assert_eq!(p.clusters, 2);
        assert_eq!(p.intvl_max, 3600 / 60 + ARRAY_EXTRA);
    }

    #[test]
    fn rejects_bad_cluster_count() {
        let err = Params::parse(args(&["-f", "x", "-k", "1"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { opt: 'k', .. }));
    }

    #[test]
    fn rejects_short_window() {
        let err = Params::parse(args(&["-f", "x", "-t", "60", "-w", "60"])).unwrap_err();
        assert_eq!(err, ConfigError::WindowTooShort);
    }

    #[test]
    fn help_short_circuits() {
        let p = Params::parse(args(&["-h"])).unwrap();
        assert!(p.help);
        let p = Params::parse(args(&["-H"])).unwrap();
        assert!(p.help);
    }

    #[test]
    fn mode_bits() {
        let p = Params::parse(args(&["-f", "x", "-d", "7"])).unwrap();
        assert!(p.mode_has(MODE_SYN_FLOODING));
        assert!(p.mode_has(MODE_VER_PORTSCAN));
        assert!(p.mode_has(MODE_HOR_PORTSCAN));
    }
}
