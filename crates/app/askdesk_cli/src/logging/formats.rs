use std::io::Write;

use flexi_logger::{DeferredNow, Record, style};

/// `LEVEL message`, with the level coloured; debug and trace lines also
/// carry the module path.
pub fn cli_format(
    w: &mut dyn Write,
    _now: &mut DeferredNow,
    record: &Record,
) -> Result<(), std::io::Error> {
    let level = record.level();
    if level <= log::Level::Info {
        write!(w, "{} {}", style(level).paint(level.to_string()), record.args())
    } else {
        write!(
            w,
            "{} [{}] {}",
            style(level).paint(level.to_string()),
            record.module_path().unwrap_or("<unnamed>"),
            record.args()
        )
    }
}
