use cumulus_cloud_azure::{BootScript, BootScriptParams};
use cumulus_core::Stack;

const STORAGE_KEY_PLACEHOLDER: &str = "<storage-key>";
const PUBLIC_IP_PLACEHOLDER: &str = "<public-ip>";

pub fn handle(
    stack: &Stack,
    storage_key: Option<String>,
    public_ip: Option<String>,
    base64: bool,
    reveal: bool,
) -> anyhow::Result<()> {
    let has_key = storage_key.is_some();
    if base64 && has_key && !reveal {
        anyhow::bail!("--base64 output embeds the storage key; pass --reveal as well");
    }

    let key = storage_key.unwrap_or_else(|| STORAGE_KEY_PLACEHOLDER.to_string());
    let public_ip = public_ip.or_else(|| Some(PUBLIC_IP_PLACEHOLDER.to_string()));
    let script = BootScript::render(&BootScriptParams::from_stack(stack, key, public_ip))?;

    if base64 {
        println!("{}", script.custom_data());
    } else if reveal || !has_key {
        print!("{}", script.as_str());
    } else {
        print!("{}", script.redacted());
    }
    Ok(())
}
