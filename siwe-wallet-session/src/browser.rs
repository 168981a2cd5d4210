//! The [EIP-1193] provider a browser extension injects as `window.ethereum`.
//!
//! [EIP-1193]: https://eips.ethereum.org/EIPS/eip-1193

use crate::{ProviderError, ProviderSigner, ProviderSource, WalletProvider};
use async_trait::async_trait;
use js_sys::{Array, Function, Object, Promise, Reflect};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

impl From<JsValue> for ProviderError {
    /// Reads the `{ code, message }` fields of a rejected provider request.
    fn from(value: JsValue) -> Self {
        let code = Reflect::get(&value, &JsValue::from_str("code"))
            .ok()
            .and_then(|code| code.as_f64())
            .map(|code| code as i64);
        let message = Reflect::get(&value, &JsValue::from_str("message"))
            .ok()
            .and_then(|message| message.as_string())
            .unwrap_or_else(|| format!("{value:?}"));
        ProviderError { code, message }
    }
}

/// The browser window, the source of the injected provider.
#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserWindow;

impl ProviderSource for BrowserWindow {
    type Provider = BrowserProvider;

    fn injected_provider(&self) -> Option<BrowserProvider> {
        let window = web_sys::window()?;
        let ethereum = Reflect::get(&window, &JsValue::from_str("ethereum")).ok()?;
        if ethereum.is_undefined() || ethereum.is_null() {
            return None
        }
        ethereum.dyn_into::<Object>().ok().map(BrowserProvider::new)
    }
}

/// A handle to the injected `window.ethereum` object.
#[derive(Clone, Debug)]
pub struct BrowserProvider {
    ethereum: Object,
}

impl BrowserProvider {
    pub fn new(ethereum: Object) -> Self {
        Self { ethereum }
    }

    /// Sends `{ method, params }` through the provider's `request` function.
    async fn request(&self, method: &str, params: Array) -> Result<JsValue, ProviderError> {
        let args = Object::new();
        Reflect::set(&args, &JsValue::from_str("method"), &JsValue::from_str(method))?;
        Reflect::set(&args, &JsValue::from_str("params"), &params)?;

        let request: Function = Reflect::get(&self.ethereum, &JsValue::from_str("request"))?
            .dyn_into()
            .map_err(|_| ProviderError::other("injected provider has no request function"))?;
        let promise: Promise = request
            .call1(&self.ethereum, &args)?
            .dyn_into()
            .map_err(|_| ProviderError::other("provider request did not return a promise"))?;

        Ok(JsFuture::from(promise).await?)
    }
}

#[async_trait(?Send)]
impl WalletProvider for BrowserProvider {
    type Signer = BrowserSigner;

    async fn request_accounts(&self) -> Result<Vec<String>, ProviderError> {
        let accounts = self.request("eth_requestAccounts", Array::new()).await?;
        if !Array::is_array(&accounts) {
            return Err(ProviderError::other("eth_requestAccounts did not return an array"))
        }
        Ok(Array::from(&accounts).iter().filter_map(|account| account.as_string()).collect())
    }

    async fn signer(&self, account: &str) -> Result<BrowserSigner, ProviderError> {
        Ok(BrowserSigner { provider: self.clone(), address: account.to_owned() })
    }
}

/// Signs through the injected provider's `personal_sign`.
#[derive(Clone, Debug)]
pub struct BrowserSigner {
    provider: BrowserProvider,
    address: String,
}

#[async_trait(?Send)]
impl ProviderSigner for BrowserSigner {
    async fn address(&self) -> Result<String, ProviderError> {
        Ok(self.address.clone())
    }

    async fn sign_message(&self, message: &str) -> Result<String, ProviderError> {
        let data = format!("0x{}", siwe_wallet_core::utils::hex::encode(message.as_bytes()));
        let params = Array::of2(&JsValue::from_str(&data), &JsValue::from_str(&self.address));

        self.provider
            .request("personal_sign", params)
            .await?
            .as_string()
            .ok_or_else(|| ProviderError::other("personal_sign did not return a string"))
    }
}
