//! Output-script classification.
//!
//! Maps a script to the canonical base58check address for the standard
//! pay-to-pubkey-hash, pay-to-script-hash and bare pay-to-pubkey forms;
//! anything else is unindexable and maps to `None`.

use bitcoin::base58;
use bitcoin::hashes::{hash160, Hash as _};
use chain_types::NetworkParams;

const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;
const OP_PUSHDATA4: u8 = 0x4e;
const OP_DUP: u8 = 0x76;
const OP_EQUAL: u8 = 0x87;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_HASH160: u8 = 0xa9;
const OP_CHECKSIG: u8 = 0xac;

/// Upper bound on a single declared push; anything larger aborts the scan.
const MAX_PUSH_LEN: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Op {
    Code(u8),
    Push(Vec<u8>),
}

/// Classifies `script` and renders the owning address, or `None` when the
/// script pays to something this index does not track.
pub fn script_to_address(script: &[u8], params: &NetworkParams) -> Option<String> {
    let ops = parse_ops(script);
    match ops.as_slice() {
        [Op::Code(OP_DUP), Op::Code(OP_HASH160), Op::Push(hash), Op::Code(OP_EQUALVERIFY), Op::Code(OP_CHECKSIG)]
            if hash.len() == 20 =>
        {
            Some(base58check(params.p2pkh_version, hash))
        }
        [Op::Code(OP_HASH160), Op::Push(hash), Op::Code(OP_EQUAL)] if hash.len() == 20 => {
            Some(base58check(params.p2sh_version, hash))
        }
        [Op::Push(pubkey), Op::Code(OP_CHECKSIG)]
            if pubkey.len() == 33 || pubkey.len() == 65 =>
        {
            let hash = hash160::Hash::hash(pubkey);
            Some(base58check(params.p2pkh_version, hash.as_byte_array()))
        }
        _ => None,
    }
}

fn base58check(version: u8, payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(1 + payload.len());
    data.push(version);
    data.extend_from_slice(payload);
    base58::encode_check(&data)
}

/// Scans a script into opcodes and push data.
///
/// The scan is deliberately tolerant of truncated pushes: missing length
/// bytes read as zero and missing push data is zero-padded, so historical
/// non-standard scripts classify as `None` instead of halting the indexer.
fn parse_ops(script: &[u8]) -> Vec<Op> {
    let mut ops = Vec::new();
    let mut pos = 0;
    while pos < script.len() {
        let opcode = script[pos];
        pos += 1;
        let push_len = match opcode {
            1..=75 => Some(opcode as usize),
            OP_PUSHDATA1 => Some(read_le_len(script, &mut pos, 1)),
            OP_PUSHDATA2 => Some(read_le_len(script, &mut pos, 2)),
            OP_PUSHDATA4 => Some(read_le_len(script, &mut pos, 4)),
            _ => None,
        };
        match push_len {
            Some(len) if len > MAX_PUSH_LEN => break,
            Some(len) => {
                let start = pos.min(script.len());
                let end = pos.saturating_add(len).min(script.len());
                let mut data = script[start..end].to_vec();
                data.resize(len, 0);
                pos = pos.saturating_add(len);
                ops.push(Op::Push(data));
            }
            None => ops.push(Op::Code(opcode)),
        }
    }
    ops
}

// Missing length bytes read as zero.
fn read_le_len(script: &[u8], pos: &mut usize, width: usize) -> usize {
    let mut len = 0usize;
    for i in 0..width {
        let byte = script.get(*pos + i).copied().unwrap_or(0);
        len |= (byte as usize) << (8 * i);
    }
    *pos += width;
    len
}
