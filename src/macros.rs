//! Internal macro support for the rustmiio crate.

/// Defines MIoT status code constants along with a message lookup helper.
macro_rules! define_status_codes {
    ($($name:ident = $code:expr => $msg:expr),* $(,)?) => {
        $(
            #[doc = $msg]
            pub const $name: i64 = $code;
        )*

        /// Returns the human-readable description for a MIoT status code.
        pub fn status_message(code: i64) -> &'static str {
            $(
                if code == $name {
                    return $msg;
                }
            )*
            "Unknown Status Code"
        }
    };
}
