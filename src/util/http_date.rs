//! IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`) for `Last-Modified` and friends.

use time::{
    OffsetDateTime, PrimitiveDateTime, UtcOffset, format_description::FormatItem,
    macros::format_description,
};

const IMF_FIXDATE: &[FormatItem<'static>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

/// Format a timestamp as an HTTP date, converting to UTC first.
pub fn format(value: OffsetDateTime) -> Option<String> {
    value.to_offset(UtcOffset::UTC).format(IMF_FIXDATE).ok()
}

/// Parse an IMF-fixdate header value. Obsolete RFC 850 and asctime forms are not accepted.
pub fn parse(value: &str) -> Option<OffsetDateTime> {
    PrimitiveDateTime::parse(value.trim(), IMF_FIXDATE)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn formats_imf_fixdate() {
        let value = datetime!(1994-11-06 08:49:37 UTC);
        assert_eq!(
            format(value).as_deref(),
            Some("Sun, 06 Nov 1994 08:49:37 GMT")
        );
    }

    #[test]
    fn converts_offsets_to_gmt() {
        let value = datetime!(2024-01-01 08:00:00 +08:00);
        assert_eq!(
            format(value).as_deref(),
            Some("Mon, 01 Jan 2024 00:00:00 GMT")
        );
    }

    #[test]
    fn parses_what_it_formats() {
        let value = datetime!(2024-02-29 23:59:59 UTC);
        let formatted = format(value).expect("format");
        assert_eq!(parse(&formatted), Some(value));
    }

    #[test]
    fn rejects_other_layouts() {
        assert_eq!(parse("2024-01-01T00:00:00Z"), None);
        assert_eq!(parse("Sunday, 06-Nov-94 08:49:37 GMT"), None);
    }
}
