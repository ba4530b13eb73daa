//! BLAKE3 digests of generated text, for comparing output against golden
//! files without diffing whole modules.

/// Digest of one module's text. Returns `"blake3:{hex}"`.
pub fn text_digest(text: &str) -> String {
    format!("blake3:{}", blake3::hash(text.as_bytes()).to_hex())
}

/// Digest over `(module name, module text)` pairs, in the order given.
pub fn package_digest<'a, I>(modules: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut hasher = blake3::Hasher::new();
    for (name, text) in modules {
        hasher.update(name.as_bytes());
        hasher.update(b"\0");
        hasher.update(text_digest(text).as_bytes());
        hasher.update(b"\n");
    }
    format!("blake3:{}", hasher.finalize().to_hex())
}
