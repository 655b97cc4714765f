//! Build script: render the rtid man page for packaging.

use std::{env, fs, io, path::Path, path::PathBuf};
use time::{OffsetDateTime, format_description::well_known::Iso8601};

const FALLBACK_DATE: &str = "1970-01-01";

fn manual_date() -> String {
    let Ok(raw) = env::var("SOURCE_DATE_EPOCH") else {
        return FALLBACK_DATE.into();
    };
    let Ok(seconds) = raw.parse::<i64>() else {
        println!(
            "cargo:warning=Invalid SOURCE_DATE_EPOCH '{raw}'; expected integer seconds; \
             falling back to {FALLBACK_DATE}"
        );
        return FALLBACK_DATE.into();
    };
    OffsetDateTime::from_unix_timestamp(seconds)
        .ok()
        .and_then(|moment| moment.format(&Iso8601::DATE).ok())
        .unwrap_or_else(|| {
            println!(
                "cargo:warning=SOURCE_DATE_EPOCH '{raw}' is out of range; falling back to \
                 {FALLBACK_DATE}"
            );
            FALLBACK_DATE.into()
        })
}

/// `OUT_DIR` is `{target}/{profile}/build/{crate}-{hash}/out`.
fn workspace_target_dir() -> Option<PathBuf> {
    let out_dir = PathBuf::from(env::var_os("OUT_DIR")?);
    out_dir
        .ancestors()
        .nth(4)
        .map(Path::to_path_buf)
}

fn man_dir() -> PathBuf {
    let target = env::var("TARGET").unwrap_or_else(|_| "unknown-target".into());
    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown-profile".into());
    workspace_target_dir()
        .unwrap_or_else(|| PathBuf::from("target"))
        .join(format!("generated-man/{target}/{profile}"))
}

fn write_man_page(data: &[u8], dir: &Path, page_name: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let destination = dir.join(page_name);
    let staged = dir.join(format!("{page_name}.tmp"));
    fs::write(&staged, data)?;
    if destination.exists() {
        fs::remove_file(&destination)?;
    }
    fs::rename(&staged, &destination)?;
    Ok(destination)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    for variable in [
        "CARGO_PKG_VERSION",
        "CARGO_PKG_NAME",
        "SOURCE_DATE_EPOCH",
        "TARGET",
        "PROFILE",
    ] {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    let binary_name = env::var("CARGO_PKG_NAME").unwrap_or_else(|_| "rtid".into());
    let version = env::var("CARGO_PKG_VERSION")
        .map_err(|_| "CARGO_PKG_VERSION must be set by Cargo to render the manual page")?;
    let title = binary_name.to_uppercase();
    let date = manual_date();
    let man_page = format!(
        ".TH \"{title}\" \"1\" \"{date}\" \"{binary_name} {version}\" \"RTI Daemon\"\n\
.SH NAME\n\
{binary_name} \\- HLA run-time infrastructure coordination authority\n\
.SH SYNOPSIS\n\
.B {binary_name}\n\
[\\fB\\-\\-connection\\fR \\fItype\\fR]\n\
[\\fB\\-\\-log\\-filter\\fR \\fIfilter\\fR]\n\
[\\fB\\-\\-log\\-format\\fR \\fIjson|compact\\fR]\n\
[\\fB\\-\\-resign\\-policy\\fR \\fIprune|retain\\fR]\n\
.SH DESCRIPTION\n\
{binary_name} attaches a coordination authority to an in-process exchange and\n\
serves federation lifecycle and synchronization point requests until it\n\
receives SIGTERM, SIGINT, SIGQUIT or SIGHUP.\n\
.SH ENVIRONMENT\n\
Every option may also be supplied as an RTI_ prefixed environment variable.\n"
    );
    let page_name = format!("{binary_name}.1");

    write_man_page(man_page.as_bytes(), &man_dir(), &page_name)?;
    if let Some(extra) = env::var_os("OUT_DIR") {
        let extra = PathBuf::from(extra);
        if let Err(error) = write_man_page(man_page.as_bytes(), &extra, &page_name) {
            println!(
                "cargo:warning=Failed to stage manual page in OUT_DIR ({}): {error}",
                extra.display()
            );
        }
    }
    Ok(())
}
