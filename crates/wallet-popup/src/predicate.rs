use std::fmt;

const EXTENSION_SCHEME: &str = "chrome-extension://";

/// Which window addresses count as a given popup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UrlPredicate {
    /// Extension page, or any page with "wallet" in its address.
    WalletConnect,
    /// Extension notification page, where signing prompts are shown.
    TxConfirmation,
    /// Address contains the given fragment.
    Contains(String),
}

impl UrlPredicate {
    pub fn matches(&self, url: &str) -> bool {
        match self {
            UrlPredicate::WalletConnect => url.contains(EXTENSION_SCHEME) || url.contains("wallet"),
            UrlPredicate::TxConfirmation => {
                url.contains(EXTENSION_SCHEME) && url.contains("notification")
            }
            UrlPredicate::Contains(fragment) => url.contains(fragment.as_str()),
        }
    }
}

impl fmt::Display for UrlPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlPredicate::WalletConnect => f.write_str("wallet-connect"),
            UrlPredicate::TxConfirmation => f.write_str("tx-confirmation"),
            UrlPredicate::Contains(fragment) => write!(f, "contains({fragment})"),
        }
    }
}
