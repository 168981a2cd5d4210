use crate::ProviderError;
use async_trait::async_trait;
use std::fmt::Debug;

/// A wallet bridge, usually the object a browser extension injects as `window.ethereum`.
///
/// Implement this trait to drive a [`WalletSession`](crate::WalletSession) with a different
/// wallet, e.g. a hardware device or a test double.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait WalletProvider: Debug {
    type Signer: ProviderSigner;

    /// Asks the wallet for account access (`eth_requestAccounts`). May wait on the user to
    /// approve the wallet's prompt.
    async fn request_accounts(&self) -> Result<Vec<String>, ProviderError>;

    /// Derives a signer bound to one of the authorized accounts.
    async fn signer(&self, account: &str) -> Result<Self::Signer, ProviderError>;
}

/// Signing authority over a single wallet account.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait ProviderSigner: Debug {
    /// The account address, in the casing the wallet reports it
    async fn address(&self) -> Result<String, ProviderError>;

    /// Signs `message` with the EIP-191 prefix (`personal_sign`) and returns the hex signature.
    /// May wait on the user to approve the wallet's prompt.
    async fn sign_message(&self, message: &str) -> Result<String, ProviderError>;
}

/// The host environment a wallet provider is injected into.
pub trait ProviderSource {
    type Provider: WalletProvider;

    /// Returns a handle to the injected provider, if there is one.
    fn injected_provider(&self) -> Option<Self::Provider>;

    /// Whether a provider is currently injected
    fn has_provider(&self) -> bool {
        self.injected_provider().is_some()
    }
}

/// A provider handed over directly, or the absence of one.
impl<P: WalletProvider + Clone> ProviderSource for Option<P> {
    type Provider = P;

    fn injected_provider(&self) -> Option<P> {
        self.clone()
    }

    fn has_provider(&self) -> bool {
        self.is_some()
    }
}
