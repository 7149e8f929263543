//! Admission of caller-supplied probe targets against a snapshot's
//! allow-list. Nothing here touches the network.

use crate::{DerivationMode, RouteSnapshot};
use http::Uri;
use thiserror::Error;


/// A target that may be dialed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Admitted {
    /// The allow-list entry that matched.
    pub identity: String,

    /// The URL to dial.
    pub url: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("invalid target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("'{identity}' is not a valid backend defined in any HTTPRoute")]
    NotAllowed { identity: String },
}

/// Admits `target` if its identity is in the snapshot's allow-list.
///
/// In address mode the target must equal an allowed address byte-for-byte, so
/// no alternate spelling of an allowed address is ever dialed. In hostname mode
/// the target must be an `http` or `https` URL without userinfo or an explicit
/// port whose host matches an allowed hostname; the re-serialized URL is
/// dialed.
pub fn admit(snapshot: &RouteSnapshot, target: &str) -> Result<Admitted, Rejection> {
    let uri = parse_absolute(target)?;

    match snapshot.mode {
        DerivationMode::Address => {
            if !snapshot.allowed.contains(target) {
                return Err(Rejection::NotAllowed {
                    identity: target.to_string(),
                });
            }
            Ok(Admitted {
                identity: target.to_string(),
                url: target.to_string(),
            })
        }

        DerivationMode::Hostname => {
            match uri.scheme_str() {
                Some("http") | Some("https") => {}
                _ => return Err(invalid(target, "scheme must be http or https")),
            }
            // `parse_absolute` guarantees an authority.
            let authority = uri
                .authority()
                .ok_or_else(|| invalid(target, "missing host"))?;
            if authority.as_str().contains('@') {
                return Err(invalid(target, "userinfo is not permitted"));
            }
            if authority.port().is_some() {
                return Err(invalid(target, "an explicit port is not permitted"));
            }

            let host = authority.host().to_ascii_lowercase();
            if !snapshot.allowed.contains(&host) {
                return Err(Rejection::NotAllowed { identity: host });
            }
            Ok(Admitted {
                identity: host,
                url: uri.to_string(),
            })
        }
    }
}

fn parse_absolute(target: &str) -> Result<Uri, Rejection> {
    let uri = target
        .parse::<Uri>()
        .map_err(|error| invalid(target, error))?;
    if uri.scheme().is_none() {
        return Err(invalid(target, "missing scheme"));
    }
    match uri.authority() {
        Some(authority) if !authority.host().is_empty() => Ok(uri),
        _ => Err(invalid(target, "missing host")),
    }
}

fn invalid(target: &str, reason: impl std::fmt::Display) -> Rejection {
    Rejection::InvalidTarget {
        target: target.to_string(),
        reason: reason.to_string(),
    }
}
