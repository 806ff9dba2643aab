/// Concatenates adjacent byte-string literals into one `BytesMut`, so long
/// wire fixtures can be split across lines without an explicit `+` or `,`
/// between each piece.
#[macro_export]
macro_rules! bconcat {
    ($($chunk: expr)+) => {{
        let mut buf = ::bytes::BytesMut::new();
        $(buf.extend_from_slice($chunk);)+
        buf
    }};
}
