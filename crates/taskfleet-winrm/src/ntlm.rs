//! Minimal NTLM (NTLMv2) message construction for the WinRM HTTP exchange.
//!
//! Only the pieces the executor needs: a NEGOTIATE message, CHALLENGE
//! parsing, and an AUTHENTICATE message carrying an NTLMv2 response.
//! Field layouts follow MS-NLMP; the documented test vectors in the tests
//! below pin the crypto.

use hmac::{Hmac, Mac};
use md4::{Digest, Md4};
use md5::Md5;

use crate::error::{Error, Result};

type HmacMd5 = Hmac<Md5>;

const SIGNATURE: &[u8; 8] = b"NTLMSSP\0";

const NEGOTIATE_UNICODE: u32 = 0x0000_0001;
const REQUEST_TARGET: u32 = 0x0000_0004;
const NEGOTIATE_NTLM: u32 = 0x0000_0200;
const NEGOTIATE_ALWAYS_SIGN: u32 = 0x0000_8000;
const NEGOTIATE_EXTENDED_SESSION_SECURITY: u32 = 0x0008_0000;
const NEGOTIATE_128: u32 = 0x2000_0000;
const NEGOTIATE_56: u32 = 0x8000_0000;

const NEGOTIATE_FLAGS: u32 = NEGOTIATE_UNICODE
    | REQUEST_TARGET
    | NEGOTIATE_NTLM
    | NEGOTIATE_ALWAYS_SIGN
    | NEGOTIATE_EXTENDED_SESSION_SECURITY
    | NEGOTIATE_128
    | NEGOTIATE_56;

/// Seconds between the Windows FILETIME epoch (1601) and the Unix epoch.
const FILETIME_UNIX_OFFSET_SECS: u64 = 11_644_473_600;

pub fn utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

/// Current time as a Windows FILETIME (100ns ticks since 1601).
pub fn filetime_now() -> u64 {
    let unix = chrono::Utc::now().timestamp().max(0) as u64;
    (unix + FILETIME_UNIX_OFFSET_SECS) * 10_000_000
}

/// Type 1 message: empty domain and workstation, flags only.
pub fn negotiate_message() -> Vec<u8> {
    let mut msg = Vec::with_capacity(32);
    msg.extend_from_slice(SIGNATURE);
    msg.extend_from_slice(&1u32.to_le_bytes());
    msg.extend_from_slice(&NEGOTIATE_FLAGS.to_le_bytes());
    // Empty domain and workstation security buffers, both pointing at the
    // end of the fixed header.
    for _ in 0..2 {
        msg.extend_from_slice(&0u16.to_le_bytes());
        msg.extend_from_slice(&0u16.to_le_bytes());
        msg.extend_from_slice(&32u32.to_le_bytes());
    }
    msg
}

#[derive(Debug, Clone)]
pub struct Challenge {
    pub server_challenge: [u8; 8],
    pub target_info: Vec<u8>,
    pub flags: u32,
}

/// Parse a Type 2 (CHALLENGE) message.
pub fn parse_challenge(data: &[u8]) -> Result<Challenge> {
    if data.len() < 48 || &data[0..8] != SIGNATURE {
        return Err(Error::Auth("malformed NTLM challenge".to_string()));
    }
    let message_type = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);
    if message_type != 2 {
        return Err(Error::Auth(format!(
            "expected NTLM challenge, got message type {}",
            message_type
        )));
    }

    let flags = u32::from_le_bytes([data[20], data[21], data[22], data[23]]);
    let mut server_challenge = [0u8; 8];
    server_challenge.copy_from_slice(&data[24..32]);

    let info_len = u16::from_le_bytes([data[40], data[41]]) as usize;
    let info_offset = u32::from_le_bytes([data[44], data[45], data[46], data[47]]) as usize;
    if info_offset + info_len > data.len() {
        return Err(Error::Auth("NTLM challenge target info out of bounds".to_string()));
    }
    let target_info = data[info_offset..info_offset + info_len].to_vec();

    Ok(Challenge { server_challenge, target_info, flags })
}

fn hmac_md5(key: &[u8], data: &[u8]) -> [u8; 16] {
    // HMAC accepts keys of any length, so this cannot fail.
    let mut mac = HmacMd5::new_from_slice(key).expect("HMAC key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// NTOWFv2: HMAC-MD5 over the uppercased user + domain, keyed by the MD4
/// of the UTF-16LE password.
pub fn ntowf_v2(user: &str, domain: &str, password: &str) -> [u8; 16] {
    let mut md4 = Md4::new();
    md4.update(utf16le(password));
    let nt_hash = md4.finalize();

    let identity = format!("{}{}", user.to_uppercase(), domain);
    hmac_md5(&nt_hash, &utf16le(&identity))
}

/// The NTLMv2 client blob hashed together with the server challenge.
fn ntlmv2_blob(timestamp: u64, client_challenge: &[u8; 8], target_info: &[u8]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(32 + target_info.len());
    blob.extend_from_slice(&[0x01, 0x01, 0x00, 0x00]);
    blob.extend_from_slice(&[0x00; 4]);
    blob.extend_from_slice(&timestamp.to_le_bytes());
    blob.extend_from_slice(client_challenge);
    blob.extend_from_slice(&[0x00; 4]);
    blob.extend_from_slice(target_info);
    blob.extend_from_slice(&[0x00; 4]);
    blob
}

/// NTLMv2 response: proof ++ blob.
pub fn ntlmv2_response(
    key: &[u8; 16],
    server_challenge: &[u8; 8],
    timestamp: u64,
    client_challenge: &[u8; 8],
    target_info: &[u8],
) -> Vec<u8> {
    let blob = ntlmv2_blob(timestamp, client_challenge, target_info);
    let mut hashed = Vec::with_capacity(8 + blob.len());
    hashed.extend_from_slice(server_challenge);
    hashed.extend_from_slice(&blob);
    let proof = hmac_md5(key, &hashed);

    let mut response = Vec::with_capacity(16 + blob.len());
    response.extend_from_slice(&proof);
    response.extend_from_slice(&blob);
    response
}

fn lmv2_response(key: &[u8; 16], server_challenge: &[u8; 8], client_challenge: &[u8; 8]) -> Vec<u8> {
    let mut hashed = Vec::with_capacity(16);
    hashed.extend_from_slice(server_challenge);
    hashed.extend_from_slice(client_challenge);
    let proof = hmac_md5(key, &hashed);

    let mut response = Vec::with_capacity(24);
    response.extend_from_slice(&proof);
    response.extend_from_slice(client_challenge);
    response
}

/// Type 3 message carrying the NTLMv2 proof. `timestamp` and
/// `client_challenge` are injected so tests can use the documented vectors.
pub fn authenticate_message(
    challenge: &Challenge,
    user: &str,
    domain: &str,
    password: &str,
    workstation: &str,
    client_challenge: [u8; 8],
    timestamp: u64,
) -> Vec<u8> {
    let key = ntowf_v2(user, domain, password);
    let nt_response = ntlmv2_response(
        &key,
        &challenge.server_challenge,
        timestamp,
        &client_challenge,
        &challenge.target_info,
    );
    let lm_response = lmv2_response(&key, &challenge.server_challenge, &client_challenge);

    let domain_bytes = utf16le(domain);
    let user_bytes = utf16le(user);
    let workstation_bytes = utf16le(workstation);

    const HEADER_LEN: usize = 64;
    let mut offset = HEADER_LEN;
    let mut header = Vec::with_capacity(HEADER_LEN);
    let mut payload = Vec::new();

    header.extend_from_slice(SIGNATURE);
    header.extend_from_slice(&3u32.to_le_bytes());

    // Payload order: domain, user, workstation, LM response, NT response,
    // session key (empty). Each security buffer is (len, maxlen, offset).
    let mut push_buffer = |header: &mut Vec<u8>, payload: &mut Vec<u8>, data: &[u8]| {
        header.extend_from_slice(&(data.len() as u16).to_le_bytes());
        header.extend_from_slice(&(data.len() as u16).to_le_bytes());
        header.extend_from_slice(&(offset as u32).to_le_bytes());
        payload.extend_from_slice(data);
        offset += data.len();
    };

    // The header field order differs from the payload order: LM and NT
    // responses come first in the header.
    let mut lm_header = Vec::new();
    let mut nt_header = Vec::new();
    let mut domain_header = Vec::new();
    let mut user_header = Vec::new();
    let mut workstation_header = Vec::new();
    let mut session_key_header = Vec::new();

    push_buffer(&mut domain_header, &mut payload, &domain_bytes);
    push_buffer(&mut user_header, &mut payload, &user_bytes);
    push_buffer(&mut workstation_header, &mut payload, &workstation_bytes);
    push_buffer(&mut lm_header, &mut payload, &lm_response);
    push_buffer(&mut nt_header, &mut payload, &nt_response);
    push_buffer(&mut session_key_header, &mut payload, &[]);

    header.extend_from_slice(&lm_header);
    header.extend_from_slice(&nt_header);
    header.extend_from_slice(&domain_header);
    header.extend_from_slice(&user_header);
    header.extend_from_slice(&workstation_header);
    header.extend_from_slice(&session_key_header);
    header.extend_from_slice(&NEGOTIATE_FLAGS.to_le_bytes());

    let mut message = header;
    message.extend_from_slice(&payload);
    message
}

/// Split `DOMAIN\user` into its parts; a bare user name has no domain.
pub fn split_account(username: &str) -> (&str, &str) {
    match username.split_once('\\') {
        Some((domain, user)) => (domain, user),
        None => ("", username),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Target info from the MS-NLMP reference challenge: domain "Domain",
    // server "Server".
    fn reference_target_info() -> Vec<u8> {
        let mut info = Vec::new();
        info.extend_from_slice(&2u16.to_le_bytes());
        info.extend_from_slice(&12u16.to_le_bytes());
        info.extend_from_slice(&utf16le("Domain"));
        info.extend_from_slice(&1u16.to_le_bytes());
        info.extend_from_slice(&12u16.to_le_bytes());
        info.extend_from_slice(&utf16le("Server"));
        info.extend_from_slice(&0u16.to_le_bytes());
        info.extend_from_slice(&0u16.to_le_bytes());
        info
    }

    #[test]
    fn ntowf_v2_matches_reference_vector() {
        let key = ntowf_v2("User", "Domain", "Password");
        assert_eq!(hex::encode(key), "0c868a403bfd7a93a3001ef22ef02e3f");
    }

    #[test]
    fn ntlmv2_proof_matches_reference_vector() {
        let key = ntowf_v2("User", "Domain", "Password");
        let server_challenge = [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef];
        let client_challenge = [0xaa; 8];
        let response = ntlmv2_response(
            &key,
            &server_challenge,
            0,
            &client_challenge,
            &reference_target_info(),
        );
        assert_eq!(hex::encode(&response[..16]), "68cd0ab851e51c96aabc927bebef6a1c");
    }

    #[test]
    fn negotiate_message_has_expected_shape() {
        let msg = negotiate_message();
        assert_eq!(msg.len(), 32);
        assert_eq!(&msg[0..8], b"NTLMSSP\0");
        assert_eq!(u32::from_le_bytes([msg[8], msg[9], msg[10], msg[11]]), 1);
    }

    #[test]
    fn challenge_round_trip() {
        let target_info = reference_target_info();
        let mut challenge = Vec::new();
        challenge.extend_from_slice(b"NTLMSSP\0");
        challenge.extend_from_slice(&2u32.to_le_bytes());
        // Target name buffer (empty).
        challenge.extend_from_slice(&[0u8; 8]);
        challenge.extend_from_slice(&NEGOTIATE_FLAGS.to_le_bytes());
        challenge.extend_from_slice(&[0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef]);
        challenge.extend_from_slice(&[0u8; 8]);
        challenge.extend_from_slice(&(target_info.len() as u16).to_le_bytes());
        challenge.extend_from_slice(&(target_info.len() as u16).to_le_bytes());
        challenge.extend_from_slice(&48u32.to_le_bytes());
        challenge.extend_from_slice(&target_info);

        let parsed = parse_challenge(&challenge).unwrap();
        assert_eq!(parsed.server_challenge, [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef]);
        assert_eq!(parsed.target_info, target_info);
    }

    #[test]
    fn garbage_challenge_is_rejected() {
        assert!(parse_challenge(b"definitely not ntlm").is_err());
    }

    #[test]
    fn account_splitting() {
        assert_eq!(split_account("CORP\\admin"), ("CORP", "admin"));
        assert_eq!(split_account("admin"), ("", "admin"));
    }

    #[test]
    fn authenticate_message_is_well_formed() {
        let challenge = Challenge {
            server_challenge: [0x01; 8],
            target_info: reference_target_info(),
            flags: NEGOTIATE_FLAGS,
        };
        let msg = authenticate_message(&challenge, "admin", "CORP", "pw", "WS", [0xaa; 8], 0);
        assert_eq!(&msg[0..8], b"NTLMSSP\0");
        assert_eq!(u32::from_le_bytes([msg[8], msg[9], msg[10], msg[11]]), 3);
        // All security buffers must land inside the message.
        for field in 0..6 {
            let base = 12 + field * 8;
            let len = u16::from_le_bytes([msg[base], msg[base + 1]]) as usize;
            let offset =
                u32::from_le_bytes([msg[base + 4], msg[base + 5], msg[base + 6], msg[base + 7]])
                    as usize;
            assert!(offset + len <= msg.len());
        }
    }
}
