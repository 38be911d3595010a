//! Refresh orchestration: decide, call the token endpoint, merge, persist.
//!
//! [`Broker::ensure_fresh_token`] hands callers a usable access token for a user. Each call
//! takes the user's singleflight guard, reads the stored record, and runs the pure decision
//! engine. Only a `Refresh` decision reaches the provider; the response is merged into the
//! record (keeping the stored refresh token when the provider does not rotate it) and upserted.
//! Nothing is written when any stage fails.

// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, TokenSecret, UserId},
	flows::{Broker, common},
	http::TokenHttpClient,
	oauth::{TokenClient, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	refresh::{
		RefreshDecision, RefreshResult, RefreshTokenView, decide, process_refresh_result,
		validate_refresh_token,
	},
	store::TokenStore,
};

/// Access token handed back by [`Broker::ensure_fresh_token`].
#[derive(Clone, PartialEq, Eq)]
pub struct FreshToken {
	/// Access token valid past the refresh buffer.
	pub access_token: TokenSecret,
	/// Expiry of `access_token`.
	pub expires_at: OffsetDateTime,
	/// `true` when the provider was called during this request.
	pub refreshed: bool,
}
impl FreshToken {
	fn from_record(record: &TokenRecord, refreshed: bool) -> Self {
		Self { access_token: record.access_token.clone(), expires_at: record.expires_at, refreshed }
	}
}
impl Debug for FreshToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FreshToken")
			.field("access_token", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.field("refreshed", &self.refreshed)
			.finish()
	}
}

impl<C, M> Broker<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Returns an access token for `user`, refreshing it first when it is inside the buffer.
	///
	/// Concurrent calls for the same user are serialized; a follower re-reads the record its
	/// leader just stored instead of spending the refresh token again.
	pub async fn ensure_fresh_token(&self, user: &UserId) -> Result<FreshToken> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "ensure_fresh_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.refresh_guarded(user)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Performs `grant_type=refresh_token` once, without touching the store.
	pub async fn execute_refresh(&self, refresh_token: &str) -> RefreshResult {
		let client = <TokenClient<C, M>>::from_descriptor(
			&self.descriptor,
			&self.client_id,
			self.client_secret.as_deref(),
			self.http_client.clone(),
			self.transport_mapper.clone(),
		);

		self.refresh_metrics.record_provider_call();

		client.refresh_token(refresh_token).await.into()
	}

	async fn refresh_guarded(&self, user: &UserId) -> Result<FreshToken> {
		self.refresh_metrics.record_attempt();

		let _singleflight = common::lock_flow(self, user).await;
		let record = <dyn TokenStore>::fetch(self.store.as_ref(), user)
			.await
			.inspect_err(|_| self.refresh_metrics.record_failure())?
			.ok_or_else(|| {
				self.refresh_metrics.record_failure();

				Error::TokenNotFound { user: user.to_string() }
			})?;
		let now = OffsetDateTime::now_utc();

		match decide(&record.provider, &record, now, self.refresh_buffer) {
			RefreshDecision::None => {
				self.refresh_metrics.record_success();

				return Ok(FreshToken::from_record(&record, false));
			},
			RefreshDecision::Reauth(reason) => {
				self.refresh_metrics.record_reauth();
				obs::debug_transition("refresh", &format_args!("{user} needs reauth: {reason}"));

				return Err(Error::ReauthRequired { reason });
			},
			RefreshDecision::Refresh => {},
		}

		let refresh_token =
			validate_refresh_token(RefreshTokenView::from_secret(record.refresh_token.as_ref()))
				.map_err(|issue| {
					self.refresh_metrics.record_reauth();

					Error::ReauthRequired { reason: issue.into() }
				})?;
		let result = self.execute_refresh(refresh_token).await;
		let processed =
			process_refresh_result(&record, result, &record.provider, OffsetDateTime::now_utc())
				.map_err(|e| {
					self.refresh_metrics.record_failure();

					Error::from(e)
				})?;
		let updated = processed.apply_to(record);
		let fresh = FreshToken::from_record(&updated, true);

		<dyn TokenStore>::upsert(self.store.as_ref(), updated)
			.await
			.inspect_err(|_| self.refresh_metrics.record_failure())?;
		self.refresh_metrics.record_success();

		Ok(fresh)
	}
}
