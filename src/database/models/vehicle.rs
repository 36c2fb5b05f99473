use serde::{Deserialize, Serialize};

use crate::crypto::{CryptoError, EncryptedField, EncryptionEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VehicleType {
    Bike,
    Car,
}

impl VehicleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Bike => "BIKE",
            VehicleType::Car => "CAR",
        }
    }
}

/// Vehicle row ready for insert: both PII columns already split into ciphertext and hash
#[derive(Debug, Clone)]
pub struct NewVehicle {
    pub owner_name: String,
    pub owner_mobile: EncryptedField,
    pub vehicle_number: EncryptedField,
    pub vehicle_type: VehicleType,
    pub created_by_id: i64,
}

impl NewVehicle {
    pub fn encrypt(
        engine: &EncryptionEngine,
        owner_name: impl Into<String>,
        owner_mobile: &str,
        vehicle_number: &str,
        vehicle_type: VehicleType,
        created_by_id: i64,
    ) -> Result<Self, CryptoError> {
        Ok(Self {
            owner_name: owner_name.into(),
            owner_mobile: engine.encrypt_and_hash(owner_mobile)?,
            vehicle_number: engine.encrypt_and_hash(&Self::normalize_number(vehicle_number))?,
            vehicle_type,
            created_by_id,
        })
    }

    /// Plates are uppercased before hashing so lookups are case-insensitive
    pub fn normalize_number(vehicle_number: &str) -> String {
        vehicle_number.to_uppercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plate_hash_ignores_case() {
        let engine = EncryptionEngine::new(b"0123456789abcdef0123456789abcdef").unwrap();
        let lower = NewVehicle::encrypt(&engine, "Asha", "9876543210", "ka-01-ab-1234", VehicleType::Bike, 1).unwrap();
        let upper = NewVehicle::encrypt(&engine, "Asha", "9876543210", "KA-01-AB-1234", VehicleType::Bike, 1).unwrap();

        assert_eq!(lower.vehicle_number.search_hash, upper.vehicle_number.search_hash);
        assert_eq!(lower.vehicle_number.search_hash, engine.hash("KA-01-AB-1234"));
        assert_eq!(engine.decrypt(&lower.vehicle_number.ciphertext).unwrap(), "KA-01-AB-1234");
        assert_eq!(engine.decrypt(&lower.owner_mobile.ciphertext).unwrap(), "9876543210");
    }
}
