use crate::{ProviderError, ProviderSigner, WalletProvider, INTERNAL_ERROR};
use async_trait::async_trait;
use siwe_wallet_core::utils::to_checksum;
use siwe_wallet_signers::{LocalWallet, Signer};

/// A wallet provider backed by a locally held private key.
///
/// Approves every prompt unless told otherwise, which makes it a stand-in for an injected
/// wallet in development and tests.
///
/// ```
/// use siwe_wallet_session::{LocalProvider, WalletSession};
///
/// # async fn foo() -> Result<(), Box<dyn std::error::Error>> {
/// let provider = LocalProvider::new(
///     "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d".parse()?,
/// );
/// let session = WalletSession::new(Some(provider));
/// assert_eq!(session.connect().await?, "0x70997970C51812dc3A010C7d01b50e0d17dc79C8");
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct LocalProvider {
    wallet: LocalWallet,
    reject_connect: bool,
    reject_signatures: bool,
}

impl LocalProvider {
    pub fn new(wallet: LocalWallet) -> Self {
        Self { wallet, reject_connect: false, reject_signatures: false }
    }

    /// Makes the provider reject account requests as if the user dismissed the prompt
    #[must_use]
    pub fn rejecting_connect(mut self) -> Self {
        self.reject_connect = true;
        self
    }

    /// Makes the provider's signers reject every signature request
    #[must_use]
    pub fn rejecting_signatures(mut self) -> Self {
        self.reject_signatures = true;
        self
    }

    /// The EIP-55 checksummed address of the wallet
    pub fn address(&self) -> String {
        to_checksum(&self.wallet.address(), None)
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl WalletProvider for LocalProvider {
    type Signer = LocalSigner;

    async fn request_accounts(&self) -> Result<Vec<String>, ProviderError> {
        if self.reject_connect {
            return Err(ProviderError::user_rejected())
        }
        Ok(vec![self.address()])
    }

    async fn signer(&self, account: &str) -> Result<LocalSigner, ProviderError> {
        if !account.eq_ignore_ascii_case(&self.address()) {
            return Err(ProviderError::new(INTERNAL_ERROR, format!("unknown account {account}")))
        }
        Ok(LocalSigner { wallet: self.wallet.clone(), reject: self.reject_signatures })
    }
}

/// The signer handed out by [`LocalProvider`].
#[derive(Clone, Debug)]
pub struct LocalSigner {
    wallet: LocalWallet,
    reject: bool,
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl ProviderSigner for LocalSigner {
    async fn address(&self) -> Result<String, ProviderError> {
        Ok(to_checksum(&self.wallet.address(), None))
    }

    async fn sign_message(&self, message: &str) -> Result<String, ProviderError> {
        if self.reject {
            return Err(ProviderError::user_rejected())
        }
        self.wallet
            .personal_sign(message)
            .map_err(|err| ProviderError::new(INTERNAL_ERROR, err.to_string()))
    }
}
