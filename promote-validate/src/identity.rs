//! Commit author → server account resolution.
//!
//! Resolution cascades through three stages and stops at the first one that
//! produces a match:
//!
//! 1. the author's email address as-is;
//! 2. a query derived from the git author string by the first matching
//!    [`AUTHOR_STRATEGIES`] entry;
//! 3. a query derived from the email's local part ([`query_from_email`]).
//!
//! Stage 1 accepts the first of several hits. Later stages demand a unique
//! account: several hits are [`IdentityError::AmbiguousAuthor`], none after
//! stage 3 is [`IdentityError::AuthorNotFound`].

use std::fmt;
use std::sync::OnceLock;

use promote_core::types::{CommitAuthor, RemoteProject};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{IdentityError, TransportError};

// ---------------------------------------------------------------------------
// Directory collaborators
// ---------------------------------------------------------------------------

/// One user search on the server, serialized as the search request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum NameQuery {
    Email {
        email: String,
    },
    FullName {
        #[serde(rename = "firstName")]
        first: String,
        #[serde(rename = "lastName")]
        last: String,
    },
    Account {
        name: String,
    },
}

impl NameQuery {
    pub fn email(email: impl Into<String>) -> Self {
        NameQuery::Email {
            email: email.into(),
        }
    }

    pub fn full_name(first: impl Into<String>, last: impl Into<String>) -> Self {
        NameQuery::FullName {
            first: first.into(),
            last: last.into(),
        }
    }

    pub fn account(name: impl Into<String>) -> Self {
        NameQuery::Account { name: name.into() }
    }
}

impl fmt::Display for NameQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameQuery::Email { email } => write!(f, "email '{email}'"),
            NameQuery::FullName { first, last } => write!(f, "name '{first} {last}'"),
            NameQuery::Account { name } => write!(f, "account '{name}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub name: String,
}

/// Search response: the total hit count and (at most) the first page of hits.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserSearch {
    pub total: u64,
    #[serde(default)]
    pub users: Vec<UserAccount>,
}

impl UserSearch {
    fn first_name(&self) -> Option<&str> {
        self.users.first().map(|u| u.name.as_str())
    }
}

/// Account search on the target server.
pub trait UserDirectory {
    fn search(&self, query: &NameQuery) -> Result<UserSearch, TransportError>;
}

/// Project listing on the target server.
pub trait ProjectDirectory {
    fn projects(&self) -> Result<Vec<RemoteProject>, TransportError>;
}

// ---------------------------------------------------------------------------
// Query derivation
// ---------------------------------------------------------------------------

/// Derives a search query from a git author string, or declines.
pub type NameStrategy = fn(&str) -> Option<NameQuery>;

/// Author-string strategies, tried in order.
pub const AUTHOR_STRATEGIES: [NameStrategy; 4] = [
    last_comma_first,
    first_space_last,
    domain_account,
    bare_account,
];

/// Length of every account name on the server.
pub const ACCOUNT_NAME_LEN: usize = 7;

/// `"Last, First (Org)"`: organisation suffix and surrounding blanks dropped.
pub fn last_comma_first(author: &str) -> Option<NameQuery> {
    let mut parts = author.split(',');
    let last = parts.next()?.trim();
    let first = parts.next()?;
    let first = first.split('(').next().unwrap_or(first).trim();
    if first.is_empty() || last.is_empty() {
        return None;
    }
    Some(NameQuery::full_name(first, last))
}

/// `"First Last"`: the first two whitespace-separated tokens.
pub fn first_space_last(author: &str) -> Option<NameQuery> {
    let mut tokens = author.split_whitespace();
    let first = tokens.next()?;
    let last = tokens.next()?;
    Some(NameQuery::full_name(first, last))
}

/// `"DOMAIN\account"`: everything after the last backslash.
pub fn domain_account(author: &str) -> Option<NameQuery> {
    let (_, account) = author.rsplit_once('\\')?;
    let account = account.trim();
    (!account.is_empty()).then(|| NameQuery::account(account))
}

/// A bare account token such as `"FIXC9MS"`, lower-cased.
pub fn bare_account(author: &str) -> Option<NameQuery> {
    let author = author.trim();
    (author.chars().count() == ACCOUNT_NAME_LEN && !author.contains(char::is_whitespace))
        .then(|| NameQuery::account(author.to_lowercase()))
}

/// First query any of [`AUTHOR_STRATEGIES`] derives from `author`.
pub fn query_from_author(author: &str) -> Option<NameQuery> {
    AUTHOR_STRATEGIES.iter().find_map(|strategy| strategy(author))
}

fn email_local_part_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(extern\.)?([A-Za-z0-9]*)\.?([A-Za-z0-9]*).*@")
            .expect("email local-part regex must compile")
    })
}

/// Query from `[extern.]first[N].last[N]@…` or `[extern.]account@…`.
///
/// Trailing digits that disambiguate namesakes are dropped from name parts.
pub fn query_from_email(email: &str) -> Option<NameQuery> {
    let captures = email_local_part_re().captures(email)?;
    let parts: Vec<&str> = [captures.get(2), captures.get(3)]
        .into_iter()
        .flatten()
        .map(|m| m.as_str())
        .filter(|s| !s.is_empty())
        .collect();
    match parts[..] {
        [account] => Some(NameQuery::account(account)),
        [first, last] => {
            let first = strip_digits(first);
            let last = strip_digits(last);
            if first.is_empty() || last.is_empty() {
                return None;
            }
            Some(NameQuery::full_name(first, last))
        }
        _ => None,
    }
}

fn strip_digits(s: &str) -> String {
    s.chars().filter(|c| !c.is_ascii_digit()).collect()
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolve `author` to exactly one account name on the server.
pub fn resolve_author(
    directory: &dyn UserDirectory,
    author: &CommitAuthor,
) -> Result<String, IdentityError> {
    tracing::debug!("searching for email only: {}", author.email);
    let by_email = directory.search(&NameQuery::email(&author.email))?;
    if by_email.total > 0 {
        if by_email.total > 1 {
            tracing::warn!(
                "{} accounts share email {}; using the first",
                by_email.total,
                author.email
            );
        }
        if let Some(name) = by_email.first_name() {
            tracing::debug!("got user {name}");
            return Ok(name.to_string());
        }
    }

    if let Some(query) = query_from_author(&author.name) {
        tracing::debug!("searching for {query}");
        let search = directory.search(&query)?;
        if let Some(name) = unique(&query, &search)? {
            tracing::debug!("got user {name}");
            return Ok(name);
        }
    }

    tracing::debug!("try getting unique user name from email address");
    let query = query_from_email(&author.email).ok_or_else(|| not_found(author))?;
    let search = directory.search(&query)?;
    let name = unique(&query, &search)?.ok_or_else(|| not_found(author))?;
    tracing::debug!("got user {name}");
    Ok(name)
}

/// `Some` for exactly one hit, `None` for none, an error for several.
fn unique(query: &NameQuery, search: &UserSearch) -> Result<Option<String>, IdentityError> {
    tracing::debug!("number of results: {}", search.total);
    match search.total {
        0 => Ok(None),
        1 => Ok(search.first_name().map(str::to_string)),
        count => Err(IdentityError::AmbiguousAuthor {
            query: query.to_string(),
            count,
        }),
    }
}

fn not_found(author: &CommitAuthor) -> IdentityError {
    IdentityError::AuthorNotFound {
        author: format!("{} <{}>", author.name, author.email),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
