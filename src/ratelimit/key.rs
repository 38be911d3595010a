// std
use std::net::IpAddr;
// self
use crate::_prelude::*;

/// Bucket a request is counted against.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RateLimitKey {
	/// Identified user (`user:<id>`).
	User(String),
	/// Client address (`ip:<addr>`).
	Ip(String),
	/// Nothing identified the caller (`ip:unknown`).
	Unknown,
}
impl RateLimitKey {
	/// User id for user-scoped keys.
	pub fn user_id(&self) -> Option<&str> {
		match self {
			Self::User(id) => Some(id),
			_ => None,
		}
	}
}
impl Display for RateLimitKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::User(id) => write!(f, "user:{id}"),
			Self::Ip(addr) => write!(f, "ip:{addr}"),
			Self::Unknown => f.write_str("ip:unknown"),
		}
	}
}

/// Everything the middleware could learn about who sent a request.
///
/// Sources are consulted in field order; blank values are skipped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestIdentity {
	/// User attached by an upstream authentication layer.
	pub authenticated_user: Option<String>,
	/// `userId` from the JSON body.
	pub body_user_id: Option<String>,
	/// `userId` from the query string.
	pub query_user_id: Option<String>,
	/// Raw `X-Forwarded-For` header; only the first hop is used.
	pub forwarded_for: Option<String>,
	/// Raw `X-Real-IP` header.
	pub real_ip: Option<String>,
	/// Socket peer address.
	pub peer_addr: Option<IpAddr>,
}
impl RequestIdentity {
	/// Resolves the bucket key.
	pub fn key(&self) -> RateLimitKey {
		let user = [&self.authenticated_user, &self.body_user_id, &self.query_user_id]
			.into_iter()
			.find_map(|value| non_blank(value.as_deref()));

		if let Some(user) = user {
			return RateLimitKey::User(user.to_owned());
		}

		let forwarded =
			self.forwarded_for.as_deref().and_then(|raw| non_blank(raw.split(',').next()));
		let ip = forwarded.or_else(|| non_blank(self.real_ip.as_deref()));

		match (ip, self.peer_addr) {
			(Some(ip), _) => RateLimitKey::Ip(ip.to_owned()),
			(None, Some(addr)) => RateLimitKey::Ip(addr.to_string()),
			(None, None) => RateLimitKey::Unknown,
		}
	}
}

fn non_blank(value: Option<&str>) -> Option<&str> {
	value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn users_win_over_addresses() {
		let identity = RequestIdentity {
			body_user_id: Some("user-body".into()),
			query_user_id: Some("user-query".into()),
			forwarded_for: Some("203.0.113.9".into()),
			..Default::default()
		};

		assert_eq!(identity.key().to_string(), "user:user-body");

		let identity = RequestIdentity {
			authenticated_user: Some("user-auth".into()),
			body_user_id: Some("user-body".into()),
			..Default::default()
		};

		assert_eq!(identity.key(), RateLimitKey::User("user-auth".into()));
	}

	#[test]
	fn addresses_fall_back_in_order() {
		let identity = RequestIdentity {
			body_user_id: Some("   ".into()),
			forwarded_for: Some(" 203.0.113.9 , 10.0.0.1".into()),
			real_ip: Some("198.51.100.4".into()),
			peer_addr: Some(IpAddr::from([127, 0, 0, 1])),
			..Default::default()
		};

		assert_eq!(identity.key().to_string(), "ip:203.0.113.9");

		let identity = RequestIdentity {
			real_ip: Some("198.51.100.4".into()),
			peer_addr: Some(IpAddr::from([127, 0, 0, 1])),
			..Default::default()
		};

		assert_eq!(identity.key().to_string(), "ip:198.51.100.4");

		let identity =
			RequestIdentity { peer_addr: Some(IpAddr::from([127, 0, 0, 1])), ..Default::default() };

		assert_eq!(identity.key().to_string(), "ip:127.0.0.1");
		assert_eq!(RequestIdentity::default().key().to_string(), "ip:unknown");
	}
}
