use brokernode_core::{GenesisHash, KeyCipher, SessionType, UploadPlan};
use brokernode_metadata::models::{NewClaim, NewSettlement, NewTreasure};
use time::OffsetDateTime;

pub const GENESIS: &str = "0c2dd6c05db873553340c8c62aa11ee1bf7634699a1ad6b05e26eab34156bb75";

/// Reversible cipher binding ciphertext to the record id and creation second.
pub struct TestCipher;

impl TestCipher {
    fn pad(record_id: &str, created_at: OffsetDateTime) -> Vec<u8> {
        format!("{record_id}@{}", created_at.unix_timestamp()).into_bytes()
    }
}

impl KeyCipher for TestCipher {
    fn encrypt(
        &self,
        record_id: &str,
        created_at: OffsetDateTime,
        plaintext: &str,
    ) -> brokernode_core::Result<String> {
        let pad = Self::pad(record_id, created_at);
        Ok(plaintext
            .bytes()
            .zip(pad.iter().cycle())
            .map(|(b, k)| format!("{:02x}", b ^ k))
            .collect())
    }

    fn decrypt(
        &self,
        record_id: &str,
        created_at: OffsetDateTime,
        ciphertext: &str,
    ) -> brokernode_core::Result<String> {
        let pad = Self::pad(record_id, created_at);
        let bytes = (0..ciphertext.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&ciphertext[i..i + 2], 16))
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|e| brokernode_core::Error::Cipher(e.to_string()))?;
        let plain: Vec<u8> = bytes
            .into_iter()
            .zip(pad.iter().cycle())
            .map(|(b, k)| b ^ k)
            .collect();
        String::from_utf8(plain).map_err(|e| brokernode_core::Error::Cipher(e.to_string()))
    }
}

/// Genesis hash whose last byte is `n`.
#[allow(dead_code)]
pub fn genesis(n: u8) -> GenesisHash {
    GenesisHash::parse(&format!("{}{n:02x}", &GENESIS[..62])).unwrap()
}

#[allow(dead_code)]
pub fn plan(genesis: &GenesisHash, file_size_bytes: i64) -> UploadPlan {
    UploadPlan::new(genesis.clone(), file_size_bytes)
}

#[allow(dead_code)]
pub fn new_settlement(genesis: &GenesisHash, session_type: SessionType) -> NewSettlement {
    NewSettlement {
        genesis_hash: genesis.clone(),
        session_type,
        eth_addr_alpha: "0xalpha".to_string(),
        eth_addr_beta: "0xbeta".to_string(),
        eth_private_key: "settlement-secret".to_string(),
        total_cost: "1500000000000000000".to_string(),
        payment_status: None,
    }
}

#[allow(dead_code)]
pub fn new_treasure(genesis: &GenesisHash, sector_idx: i64) -> NewTreasure {
    NewTreasure {
        genesis_hash: genesis.clone(),
        sector_idx,
        eth_addr: format!("0xtreasure{sector_idx}"),
        eth_private_key: format!("treasure-secret-{sector_idx}"),
        prl_amount: "250".to_string(),
        message: "BURIED".to_string(),
        address: "TREASUREADDRESS".to_string(),
        prl_status: None,
    }
}

#[allow(dead_code)]
pub fn new_claim(genesis: &GenesisHash, sector_idx: i64) -> NewClaim {
    NewClaim {
        genesis_hash: genesis.clone(),
        sector_idx,
        num_chunks: 1_000_000,
        receiver_eth_addr: "0xreceiver".to_string(),
        treasure_eth_addr: format!("0xtreasure{sector_idx}"),
        treasure_eth_private_key: "claim-secret".to_string(),
        claim_prl_status: None,
        gas_status: None,
    }
}
