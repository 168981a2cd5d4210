use crate::{
    codec::{Eip4361Codec, ParsedSiweFields, SiweCodec, VerifyOptions},
    ProviderError, ProviderSigner, ProviderSource, SessionError, WalletProvider,
};
use serde::{Deserialize, Serialize};
use siwe_wallet_core::{
    utils::message_hash_hex,
    validate::{validate_field, Field},
};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, instrument, warn};

/// The outcome of a successful [`WalletSession::sign_message`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignResult {
    /// `0x`-prefixed signature, as returned by the wallet
    pub signature: String,
    /// The address of the signer at the time the signature was returned
    pub address: String,
}

#[derive(Debug)]
struct Connection<P: WalletProvider> {
    provider: Arc<P>,
    signer: Arc<P::Signer>,
}

/// A single wallet session: at most one connected provider and signer at a time.
///
/// Only [`connect`](Self::connect) writes the connection. No lock is held while waiting on the
/// wallet, so two concurrent `connect` calls both run to completion and the one resolving last
/// wins.
///
/// # Example
///
/// ```no_run
/// use siwe_wallet_session::{LocalProvider, WalletSession};
///
/// # async fn foo(message: &str) -> Result<(), Box<dyn std::error::Error>> {
/// let provider = LocalProvider::new(
///     "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d".parse()?,
/// );
/// let session = WalletSession::new(Some(provider));
///
/// let address = session.connect().await?;
/// let signed = session.sign_message(message).await?;
/// assert_eq!(signed.address, address);
/// assert!(session.verify_message(message, &signed.signature));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct WalletSession<S: ProviderSource, C = Eip4361Codec> {
    source: S,
    codec: C,
    connection: RwLock<Option<Connection<S::Provider>>>,
}

impl<S: ProviderSource> WalletSession<S> {
    /// Creates a disconnected session over the providers `source` exposes.
    pub fn new(source: S) -> Self {
        Self { source, codec: Eip4361Codec, connection: RwLock::new(None) }
    }
}

impl<S, C> WalletSession<S, C>
where
    S: ProviderSource,
    C: SiweCodec,
{
    /// Replaces the codec used to parse and verify messages.
    pub fn with_codec<D: SiweCodec>(self, codec: D) -> WalletSession<S, D> {
        WalletSession { source: self.source, codec, connection: self.connection }
    }

    /// Whether the environment exposes a wallet provider.
    pub fn is_wallet_available(&self) -> bool {
        self.source.has_provider()
    }

    /// Whether a previous [`connect`](Self::connect) succeeded.
    pub fn is_wallet_connected(&self) -> bool {
        self.connection.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// The provider of the current connection
    pub fn provider(&self) -> Option<Arc<S::Provider>> {
        self.connection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|connection| connection.provider.clone())
    }

    fn signer(&self) -> Option<Arc<<S::Provider as WalletProvider>::Signer>> {
        self.connection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|connection| connection.signer.clone())
    }

    /// Requests account access from the injected wallet and binds a signer to the first
    /// authorized account, replacing any previous connection. Returns the account address.
    ///
    /// A failed attempt leaves the previous connection in place.
    #[instrument(skip(self))]
    pub async fn connect(&self) -> Result<String, SessionError> {
        let provider = self.source.injected_provider().ok_or(SessionError::NoProvider)?;

        let (signer, address) = match authorize(&provider).await {
            Ok(authorized) => authorized,
            Err(err) if err.is_user_rejection() => return Err(SessionError::ConnectionRejected),
            Err(err) => {
                error!(%err, "error connecting to wallet");
                return Err(SessionError::ConnectionFailed(err))
            }
        };

        *self.connection.write().unwrap_or_else(PoisonError::into_inner) =
            Some(Connection { provider: Arc::new(provider), signer: Arc::new(signer) });
        debug!(%address, "wallet connected");

        Ok(address)
    }

    /// Signs a SIWE message with the connected wallet.
    ///
    /// The message is parsed and its address compared to the signer's before the wallet is
    /// asked for anything. A message for another account fails with
    /// [`SessionError::AddressMismatch`] ahead of any other validation error.
    #[instrument(skip_all)]
    pub async fn sign_message(&self, message: &str) -> Result<SignResult, SessionError> {
        let signer = self.signer().ok_or(SessionError::NotConnected)?;

        let fields = self
            .codec
            .parse(message)
            .map_err(|err| SessionError::InvalidMessageFormat(err.to_string()))?;

        let signer_address = signer.address().await.map_err(signing_error)?;
        if !fields.address.eq_ignore_ascii_case(&signer_address) {
            return Err(SessionError::AddressMismatch {
                message: fields.address,
                signer: signer_address,
            })
        }

        check_fields(&fields)?;

        debug!(address = %signer_address, "requesting signature");
        let signature = signer.sign_message(message).await.map_err(signing_error)?;
        let address = signer.address().await.map_err(signing_error)?;

        Ok(SignResult { signature, address })
    }

    /// Verifies `signature` over `message`. Any failure, including a malformed message or
    /// signature, yields `false`.
    pub fn verify_message(&self, message: &str, signature: &str) -> bool {
        self.verify_message_with(message, signature, &VerifyOptions::default())
    }

    /// Like [`verify_message`](Self::verify_message), additionally checking the expected domain
    /// and nonce.
    pub fn verify_message_with(&self, message: &str, signature: &str, opts: &VerifyOptions) -> bool {
        match self.codec.verify(message, signature, opts) {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "error verifying message");
                false
            }
        }
    }

    /// The EIP-191 hash of `message`, see [`message_hash_hex`].
    pub fn get_message_hash(&self, message: &str) -> String {
        message_hash_hex(message)
    }

    /// Whether `message` parses as a SIWE message. Blank input is rejected without consulting
    /// the codec.
    pub fn validate_siwe_message_format(&self, message: &str) -> bool {
        if message.trim().is_empty() {
            return false
        }

        match self.codec.parse(message) {
            Ok(_) => true,
            Err(err) => {
                warn!(%err, "SIWE message validation error");
                false
            }
        }
    }

    /// The fields of `message`, or `None` when it does not parse.
    pub fn parse_siwe_message(&self, message: &str) -> Option<ParsedSiweFields> {
        self.codec.parse(message).ok()
    }
}

async fn authorize<P: WalletProvider>(provider: &P) -> Result<(P::Signer, String), ProviderError> {
    let accounts = provider.request_accounts().await?;
    let account =
        accounts.first().ok_or_else(|| ProviderError::other("wallet authorized no accounts"))?;
    let signer = provider.signer(account).await?;
    let address = signer.address().await?;
    Ok((signer, address))
}

fn signing_error(err: ProviderError) -> SessionError {
    if err.is_user_rejection() {
        return SessionError::SignatureRejected
    }
    error!(%err, "error signing message");
    SessionError::SigningFailed(err)
}

/// Re-checks the fields the user is most likely to get wrong, independent of the codec.
fn check_fields(fields: &ParsedSiweFields) -> Result<(), SessionError> {
    let chain_id = fields.chain_id.to_string();
    let checks = [
        (Field::Address, fields.address.as_str()),
        (Field::ChainId, chain_id.as_str()),
        (Field::Uri, fields.uri.as_str()),
    ];

    let invalid = checks.into_iter().find(|(field, value)| !validate_field(*field, value));
    match invalid {
        Some((field, _)) => {
            Err(SessionError::InvalidMessageFormat(format!("Invalid {field} in the message.")))
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CodecError, LocalProvider, USER_REJECTED_REQUEST};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_test::traced_test;

    const ADDRESS: &str = "0x0000000000000000000000000000000000000000";
    const SIGNATURE: &str = "0x1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef";

    fn siwe_message(address: &str, uri: &str) -> String {
        format!(
            "example.com wants you to sign in with your Ethereum account:
{address}

Sign in to Example App

URI: {uri}
Version: 1
Chain ID: 1
Nonce: 12345abcde
Issued At: 2023-01-01T00:00:00.000Z"
        )
    }

    #[derive(Clone, Debug)]
    struct ScriptedProvider {
        accounts: Result<Vec<String>, ProviderError>,
        signature: Result<String, ProviderError>,
        /// Account the wallet reports once it has signed, as if the user switched accounts
        switched_to: Option<String>,
        sign_requests: Arc<AtomicUsize>,
    }

    impl Default for ScriptedProvider {
        fn default() -> Self {
            Self {
                accounts: Ok(vec![ADDRESS.to_owned()]),
                signature: Ok(SIGNATURE.to_owned()),
                switched_to: None,
                sign_requests: Arc::default(),
            }
        }
    }

    #[derive(Debug)]
    struct ScriptedSigner {
        address: String,
        signature: Result<String, ProviderError>,
        switched_to: Option<String>,
        sign_requests: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl WalletProvider for ScriptedProvider {
        type Signer = ScriptedSigner;

        async fn request_accounts(&self) -> Result<Vec<String>, ProviderError> {
            self.accounts.clone()
        }

        async fn signer(&self, account: &str) -> Result<ScriptedSigner, ProviderError> {
            Ok(ScriptedSigner {
                address: account.to_owned(),
                signature: self.signature.clone(),
                switched_to: self.switched_to.clone(),
                sign_requests: self.sign_requests.clone(),
            })
        }
    }

    #[async_trait]
    impl ProviderSigner for ScriptedSigner {
        async fn address(&self) -> Result<String, ProviderError> {
            match &self.switched_to {
                Some(switched) if self.sign_requests.load(Ordering::SeqCst) > 0 => {
                    Ok(switched.clone())
                }
                _ => Ok(self.address.clone()),
            }
        }

        async fn sign_message(&self, _message: &str) -> Result<String, ProviderError> {
            self.sign_requests.fetch_add(1, Ordering::SeqCst);
            self.signature.clone()
        }
    }

    /// Counts how often the session consults the codec
    #[derive(Debug, Default)]
    struct CountingCodec {
        parses: AtomicUsize,
    }

    impl SiweCodec for CountingCodec {
        fn parse(&self, message: &str) -> Result<ParsedSiweFields, CodecError> {
            self.parses.fetch_add(1, Ordering::SeqCst);
            Eip4361Codec.parse(message)
        }

        fn verify(
            &self,
            message: &str,
            signature: &str,
            opts: &VerifyOptions,
        ) -> Result<(), CodecError> {
            Eip4361Codec.verify(message, signature, opts)
        }
    }

    fn session(provider: ScriptedProvider) -> WalletSession<Option<ScriptedProvider>> {
        WalletSession::new(Some(provider))
    }

    /// Injects a different provider on every lookup
    #[derive(Debug)]
    struct QueuedSource(std::sync::Mutex<Vec<ScriptedProvider>>);

    impl ProviderSource for QueuedSource {
        type Provider = ScriptedProvider;

        fn injected_provider(&self) -> Option<ScriptedProvider> {
            let mut providers = self.0.lock().unwrap();
            (!providers.is_empty()).then(|| providers.remove(0))
        }

        fn has_provider(&self) -> bool {
            !self.0.lock().unwrap().is_empty()
        }
    }

    #[test]
    fn reports_availability() {
        assert!(session(ScriptedProvider::default()).is_wallet_available());
        assert!(!WalletSession::new(None::<ScriptedProvider>).is_wallet_available());
    }

    #[tokio::test]
    async fn connect_without_provider() {
        let session = WalletSession::new(None::<ScriptedProvider>);
        assert!(matches!(session.connect().await, Err(SessionError::NoProvider)));
        assert!(!session.is_wallet_connected());
    }

    #[tokio::test]
    async fn connect_returns_first_account() {
        let provider = ScriptedProvider {
            accounts: Ok(vec![ADDRESS.to_owned(), "0x70997970C51812dc3A010C7d01b50e0d17dc79C8".to_owned()]),
            ..Default::default()
        };
        let session = session(provider);
        assert!(!session.is_wallet_connected());
        assert!(session.provider().is_none());

        assert_eq!(session.connect().await.unwrap(), ADDRESS);
        assert!(session.is_wallet_connected());
        assert!(session.provider().is_some());

        // reconnecting replaces the connection
        assert_eq!(session.connect().await.unwrap(), ADDRESS);
        assert!(session.is_wallet_connected());
    }

    #[tokio::test]
    async fn connect_rejected_by_user() {
        let provider =
            ScriptedProvider { accounts: Err(ProviderError::user_rejected()), ..Default::default() };
        let session = session(provider);

        let err = session.connect().await.unwrap_err();
        assert!(matches!(err, SessionError::ConnectionRejected));
        assert!(!session.is_wallet_connected());
    }

    #[tokio::test]
    #[traced_test]
    async fn connect_failure_logs_cause() {
        let provider = ScriptedProvider {
            accounts: Err(ProviderError::new(-32002, "wallet locked")),
            ..Default::default()
        };
        let session = session(provider);

        let err = session.connect().await.unwrap_err();
        assert!(matches!(err, SessionError::ConnectionFailed(ref cause) if cause.code == Some(-32002)));
        assert_eq!(err.to_string(), "Failed to connect to wallet. Please try again.");
        assert!(logs_contain("wallet locked"));
    }

    #[tokio::test]
    async fn connect_without_accounts() {
        let session = session(ScriptedProvider { accounts: Ok(vec![]), ..Default::default() });
        assert!(matches!(session.connect().await, Err(SessionError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn sign_without_connect() {
        let session = session(ScriptedProvider::default());
        let err = session.sign_message(&siwe_message(ADDRESS, "https://example.com")).await;
        assert!(matches!(err, Err(SessionError::NotConnected)));
    }

    #[tokio::test]
    async fn signs_message_of_connected_account() {
        let provider = ScriptedProvider::default();
        let sign_requests = provider.sign_requests.clone();
        let session = session(provider);
        session.connect().await.unwrap();

        let signed =
            session.sign_message(&siwe_message(ADDRESS, "https://example.com/login")).await.unwrap();
        assert_eq!(signed, SignResult { signature: SIGNATURE.to_owned(), address: ADDRESS.to_owned() });
        assert_eq!(sign_requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn result_reports_address_after_signing() {
        let switched = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";
        let provider =
            ScriptedProvider { switched_to: Some(switched.to_owned()), ..Default::default() };
        let session = session(provider);
        session.connect().await.unwrap();

        let signed =
            session.sign_message(&siwe_message(ADDRESS, "https://example.com/login")).await.unwrap();
        assert_eq!(signed.signature, SIGNATURE);
        assert_eq!(signed.address, switched);
    }

    #[tokio::test]
    async fn reconnect_replaces_connection() {
        let other = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";
        let source = QueuedSource(std::sync::Mutex::new(vec![
            ScriptedProvider::default(),
            ScriptedProvider { accounts: Ok(vec![other.to_owned()]), ..Default::default() },
        ]));
        let session = WalletSession::new(source);

        assert_eq!(session.connect().await.unwrap(), ADDRESS);
        assert_eq!(session.connect().await.unwrap(), other);
        assert!(session.is_wallet_connected());

        let err = session
            .sign_message(&siwe_message(ADDRESS, "https://example.com/login"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::AddressMismatch { .. }));

        let signed =
            session.sign_message(&siwe_message(other, "https://example.com/login")).await.unwrap();
        assert_eq!(signed.address, other);

        // no provider left to inject, the last connection stays
        assert!(matches!(session.connect().await, Err(SessionError::NoProvider)));
        let signed =
            session.sign_message(&siwe_message(other, "https://example.com/login")).await.unwrap();
        assert_eq!(signed.address, other);
    }

    #[tokio::test]
    async fn compares_addresses_case_insensitively() {
        let provider = ScriptedProvider {
            accounts: Ok(vec!["0x70997970c51812dc3a010c7d01b50e0d17dc79c8".to_owned()]),
            ..Default::default()
        };
        let session = session(provider);
        session.connect().await.unwrap();

        let message = siwe_message("0x70997970C51812dc3A010C7d01b50e0d17dc79C8", "https://example.com");
        let signed = session.sign_message(&message).await.unwrap();
        assert_eq!(signed.address, "0x70997970c51812dc3a010c7d01b50e0d17dc79c8");
    }

    #[tokio::test]
    async fn address_mismatch_never_reaches_wallet() {
        let provider = ScriptedProvider::default();
        let sign_requests = provider.sign_requests.clone();
        let session = session(provider);
        session.connect().await.unwrap();

        let message = siwe_message("0x70997970C51812dc3A010C7d01b50e0d17dc79C8", "https://example.com");
        let err = session.sign_message(&message).await.unwrap_err();
        match err {
            SessionError::AddressMismatch { message, signer } => {
                assert_eq!(message, "0x70997970C51812dc3A010C7d01b50e0d17dc79C8");
                assert_eq!(signer, ADDRESS);
            }
            err => panic!("unexpected error {err:?}"),
        }
        assert_eq!(sign_requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn address_mismatch_takes_precedence() {
        let session = session(ScriptedProvider::default());
        session.connect().await.unwrap();

        // the URI parses but carries no authority
        let message = siwe_message("0x70997970C51812dc3A010C7d01b50e0d17dc79C8", "did:example:123");
        assert!(matches!(
            session.sign_message(&message).await,
            Err(SessionError::AddressMismatch { .. })
        ));

        let message = siwe_message(ADDRESS, "did:example:123");
        match session.sign_message(&message).await {
            Err(SessionError::InvalidMessageFormat(reason)) => {
                assert_eq!(reason, "Invalid URI in the message.")
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejects_malformed_message() {
        let provider = ScriptedProvider::default();
        let sign_requests = provider.sign_requests.clone();
        let session = session(provider);
        session.connect().await.unwrap();

        let err = session.sign_message("Invalid message format").await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidMessageFormat(_)));
        assert!(err.to_string().starts_with("Invalid SIWE message format: "));
        assert_eq!(sign_requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn signature_rejected_by_user() {
        let provider = ScriptedProvider {
            signature: Err(ProviderError::new(USER_REJECTED_REQUEST, "User denied message signature.")),
            ..Default::default()
        };
        let session = session(provider);
        session.connect().await.unwrap();

        let err = session.sign_message(&siwe_message(ADDRESS, "https://example.com")).await;
        assert!(matches!(err, Err(SessionError::SignatureRejected)));
        // the connection survives a rejected signature
        assert!(session.is_wallet_connected());
    }

    #[tokio::test]
    #[traced_test]
    async fn signing_failure_logs_cause() {
        let provider = ScriptedProvider {
            signature: Err(ProviderError::other("device disconnected")),
            ..Default::default()
        };
        let session = session(provider);
        session.connect().await.unwrap();

        let err = session.sign_message(&siwe_message(ADDRESS, "https://example.com")).await;
        assert!(matches!(err, Err(SessionError::SigningFailed(_))));
        assert!(logs_contain("device disconnected"));
    }

    #[test]
    fn validates_message_format() {
        let session = WalletSession::new(None::<ScriptedProvider>).with_codec(CountingCodec::default());

        assert!(session.validate_siwe_message_format(&siwe_message(ADDRESS, "https://example.com/login")));
        assert!(!session.validate_siwe_message_format("Invalid message format"));
        assert_eq!(session.codec.parses.load(Ordering::SeqCst), 2);

        assert!(!session.validate_siwe_message_format(""));
        assert!(!session.validate_siwe_message_format("  \n\t "));
        assert_eq!(session.codec.parses.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn parses_message_fields() {
        let session = WalletSession::new(None::<ScriptedProvider>);

        let fields = session.parse_siwe_message(&siwe_message(ADDRESS, "https://example.com/login")).unwrap();
        assert_eq!(fields.domain, "example.com");
        assert_eq!(fields.address, ADDRESS);
        assert_eq!(fields.uri, "https://example.com/login");
        assert_eq!(fields.statement.as_deref(), Some("Sign in to Example App"));
        assert_eq!(fields.nonce, "12345abcde");

        assert_eq!(session.parse_siwe_message("Invalid message format"), None);
    }

    #[test]
    fn hashes_any_message() {
        let session = WalletSession::new(None::<ScriptedProvider>);
        for message in ["", "Test message"] {
            let hash = session.get_message_hash(message);
            assert_eq!(hash.len(), 66);
            assert!(hash.starts_with("0x"));
        }
    }

    #[test]
    fn verify_never_fails_loudly() {
        let session = WalletSession::new(None::<ScriptedProvider>);
        assert!(!session.verify_message("Invalid message", SIGNATURE));
        assert!(!session.verify_message("", ""));
        // a 32 byte value is not a signature
        assert!(!session.verify_message(&siwe_message(ADDRESS, "https://example.com"), SIGNATURE));
    }

    #[tokio::test]
    async fn signs_with_local_wallet() {
        let provider = LocalProvider::new(
            "0000000000000000000000000000000000000000000000000000000000000001".parse().unwrap(),
        );
        let session = WalletSession::new(Some(provider));

        let address = session.connect().await.unwrap();
        let message = siwe_message(&address, "https://example.com/login");
        let signed = session.sign_message(&message).await.unwrap();

        assert_eq!(signed.address, address);
        assert!(session.verify_message(&message, &signed.signature));
        assert!(!session.verify_message(&message.replace("12345abcde", "edcba54321"), &signed.signature));
    }
}
