//! Stand-in executables for the external tools the bot and `deploy.sh` shell out to.
//!
//! Every stub appends `<name> <args...>` to `$STUB_LOG` so a test can assert on the calls.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Write an executable bash script named `name` into `dir`.
pub fn write_stub(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    let script = format!(
        "#!/usr/bin/env bash\necho \"{} $*\" >> \"${{STUB_LOG:-/dev/null}}\"\n{}\n",
        name, body
    );
    fs::write(&path, script).expect("write stub");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod stub");
    path
}

/// Read the call log, one entry per line.
pub fn calls(log: &Path) -> Vec<String> {
    fs::read_to_string(log)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}
