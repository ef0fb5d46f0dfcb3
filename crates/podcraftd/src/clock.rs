use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Current UTC time in RFC 3339 form.
pub(crate) fn now_rfc3339() -> Result<String, time::error::Format> {
    OffsetDateTime::now_utc().format(&Rfc3339)
}
