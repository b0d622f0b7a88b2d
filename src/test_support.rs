//! Stand-in for the ffmpeg binary, driven by markers in the file names it is
//! given:
//!
//! - `__unreadable__`: the analysis pass fails
//! - `__silent__`: analysis reports no levels
//! - `__fragile__`: any chain containing `equalizer` fails, others succeed
//! - `__fail__`: every mastering pass writes a partial file, then fails
//! - a `.wma` input: same as `__fail__`
//! - `__slow__`: hangs until killed
//!
//! Every invocation is appended to `<script>.log`, one line per call.

use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};
use tempfile::TempDir;

const SCRIPT: &str = r#"#!/bin/sh
echo "$*" >> "$0.log"
for arg in "$@"; do out="$arg"; done
case "$*" in *__slow__*) exec sleep 5 ;; esac
case "$*" in
  *"-f null"*)
    case "$*" in *__unreadable__*) echo "Invalid data found when processing input" >&2; exit 1 ;; esac
    echo "Input #0, wav, from 'input':" >&2
    echo "  Duration: 00:02:03.45, bitrate: 1411 kb/s" >&2
    case "$*" in
      *__silent__*) ;;
      *) echo "Max level: -3.20 dBFS" >&2; echo "RMS level: -12.10 dBFS" >&2 ;;
    esac
    exit 0 ;;
esac
case "$*" in *__fail__*) printf 'partial' > "$out"; echo "Error while filtering: Invalid argument" >&2; exit 1 ;; esac
case "$*" in *".wma -af"*) printf 'partial' > "$out"; echo "Decoder (codec wmav2) not found" >&2; exit 1 ;; esac
case "$*" in *__fragile__*) case "$*" in *equalizer*) echo "Error initializing filter 'equalizer'" >&2; exit 1 ;; esac ;; esac
echo "size=     512kB time=00:01:00.00 bitrate= 320.0kbits/s speed=40x" >&2
printf 'mastered' > "$out"
"#;

// Writing an executable while another test forks can leave the file busy
// (ETXTBSY) for the exec, so tests that spawn the fake hold this lock.
static SPAWN_LOCK: Mutex<()> = Mutex::new(());

pub struct FakeFfmpeg {
    dir: TempDir,
    _guard: MutexGuard<'static, ()>,
}

impl FakeFfmpeg {
    pub fn install() -> Self {
        let guard = SPAWN_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ffmpeg");
        fs::write(&path, SCRIPT).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        FakeFfmpeg { dir, _guard: guard }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().join("ffmpeg")
    }

    /// Argument lines of every invocation so far.
    pub fn invocations(&self) -> Vec<String> {
        fs::read_to_string(self.dir.path().join("ffmpeg.log"))
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// Create an empty file named `name` inside `dir`.
pub fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"RIFF").unwrap();
    path
}
