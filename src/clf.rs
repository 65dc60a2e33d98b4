//! Rendering of an [`AccessRecord`] as a Combined Log Format line.

use crate::record::AccessRecord;
use crate::zone::Zone;

/// `chrono` pattern for the bracketed CLF timestamp, e.g. `10/Oct/2000:13:55:36 -0700`.
pub const CLF_TIME_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

const SENTINEL: &str = "-";

/// Render `record` as one Combined Log Format line without a line terminator:
///
/// `host logname user [time] "method uri proto" status size "referer" "user-agent"`
///
/// Field values are written as-is: embedded quotes are not escaped, and a
/// decoded `\n` in a value ends up inside the rendered line.
pub fn to_combined(record: &AccessRecord, zone: &Zone) -> String {
    let user = record
        .user_id
        .as_deref()
        .filter(|user| !user.is_empty())
        .unwrap_or(SENTINEL);
    let timestamp = zone.format(record.timestamp, CLF_TIME_FORMAT);
    let referer = record.referer().unwrap_or(SENTINEL);
    let user_agent = record.user_agent().unwrap_or(SENTINEL);

    format!(
        r#"{} {} {} [{}] "{} {} {}" {} {} "{}" "{}""#,
        record.client_address,
        SENTINEL,
        user,
        timestamp,
        record.method,
        record.uri,
        record.protocol,
        record.status,
        record.size,
        referer,
        user_agent,
    )
}
