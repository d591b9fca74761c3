use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use md5::{Digest, Md5};

const ADDRESS_LEN: usize = 11;
const FOLDED_LEN: usize = 8;

/// Stable id for entries without a native one. Collisions are not detected.
pub fn address_of(name: &str, url: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(name.as_bytes());
    hasher.update(url.as_bytes());
    let digest = hasher.finalize();

    let mut folded = [0u8; FOLDED_LEN];
    for (i, byte) in folded.iter_mut().enumerate() {
        *byte = digest[i] ^ digest[i + FOLDED_LEN];
    }

    let mut encoded = URL_SAFE_NO_PAD.encode(folded);
    encoded.truncate(ADDRESS_LEN);
    encoded
}
