use crate::hash::{double_sha256, H256};
use crate::DecodeError;

/// A parsed transaction. Witness data is skipped during parsing; the txid is
/// always computed over the legacy serialization, matching what the node
/// reports for both pre- and post-segwit transactions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub lock_time: u32,
    pub input: Vec<TxIn>,
    pub output: Vec<TxOut>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxIn {
    pub previous_tx_hash: H256,
    pub previous_output_index: u32,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOut {
    pub value: u64,
    pub script_pub_key: Vec<u8>,
}

impl Transaction {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut r = Reader::new(bytes);

        let version = r.read_u32_le()? as i32;
        let mut input_count = r.read_varint()?;
        let mut segwit = false;
        if input_count == 0 {
            // BIP-144 marker byte; the flag that follows must be non-zero
            let flag = r.read_u8()?;
            if flag == 0 {
                return Err(DecodeError::MalformedTransaction);
            }
            segwit = true;
            input_count = r.read_varint()?;
        }

        let mut input = Vec::with_capacity(input_count.min(1024) as usize);
        for _ in 0..input_count {
            let previous_tx_hash = H256::try_from(r.read_slice(32)?)?;
            let previous_output_index = r.read_u32_le()?;
            let script_len = r.read_varint()? as usize;
            let script_sig = r.read_slice(script_len)?.to_vec();
            let sequence = r.read_u32_le()?;
            input.push(TxIn {
                previous_tx_hash,
                previous_output_index,
                script_sig,
                sequence,
            });
        }

        let output_count = r.read_varint()?;
        let mut output = Vec::with_capacity(output_count.min(1024) as usize);
        for _ in 0..output_count {
            let value = r.read_u64_le()?;
            let script_len = r.read_varint()? as usize;
            let script_pub_key = r.read_slice(script_len)?.to_vec();
            output.push(TxOut {
                value,
                script_pub_key,
            });
        }

        if segwit {
            for _ in 0..input.len() {
                let items = r.read_varint()?;
                for _ in 0..items {
                    let len = r.read_varint()? as usize;
                    r.read_slice(len)?;
                }
            }
        }

        let lock_time = r.read_u32_le()?;

        Ok(Transaction {
            version,
            lock_time,
            input,
            output,
        })
    }

    pub fn from_hex(tx_hex: &str) -> Result<Self, DecodeError> {
        let bytes = hex::decode(tx_hex).map_err(|_| DecodeError::InvalidHex)?;
        Self::from_bytes(&bytes)
    }

    /// Legacy (witness-less) serialization.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.version as u32).to_le_bytes());
        write_varint(&mut out, self.input.len() as u64);
        for txin in &self.input {
            out.extend(txin.previous_tx_hash.0);
            out.extend_from_slice(&txin.previous_output_index.to_le_bytes());
            write_varint(&mut out, txin.script_sig.len() as u64);
            out.extend_from_slice(&txin.script_sig);
            out.extend_from_slice(&txin.sequence.to_le_bytes());
        }
        write_varint(&mut out, self.output.len() as u64);
        for txout in &self.output {
            out.extend_from_slice(&txout.value.to_le_bytes());
            write_varint(&mut out, txout.script_pub_key.len() as u64);
            out.extend_from_slice(&txout.script_pub_key);
        }
        out.extend_from_slice(&self.lock_time.to_le_bytes());
        out
    }

    #[must_use]
    pub fn txid(&self) -> H256 {
        double_sha256(&self.to_bytes())
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    fn read_slice(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(len).ok_or(DecodeError::Truncated)?;
        if end > self.data.len() {
            return Err(DecodeError::Truncated);
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_slice(1)?[0])
    }

    fn read_u32_le(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.read_slice(4)?;
        Ok(u32::from_le_bytes(
            bytes.try_into().map_err(|_| DecodeError::Truncated)?,
        ))
    }

    fn read_u64_le(&mut self) -> Result<u64, DecodeError> {
        let bytes = self.read_slice(8)?;
        Ok(u64::from_le_bytes(
            bytes.try_into().map_err(|_| DecodeError::Truncated)?,
        ))
    }

    fn read_varint(&mut self) -> Result<u64, DecodeError> {
        match self.read_u8()? {
            0xfd => {
                let bytes = self.read_slice(2)?;
                Ok(u64::from(u16::from_le_bytes(
                    bytes.try_into().map_err(|_| DecodeError::Truncated)?,
                )))
            }
            0xfe => Ok(u64::from(self.read_u32_le()?)),
            0xff => self.read_u64_le(),
            n => Ok(u64::from(n)),
        }
    }
}

fn write_varint(out: &mut Vec<u8>, value: u64) {
    match value {
        0..=0xfc => out.push(value as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
}
