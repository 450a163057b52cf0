use core::fmt;

/// The 64-bit ISO 11783-5 NAME of a control function.
///
/// NAMEs are globally unique per network segment and double as the
/// arbitration key during address claiming: the numerically lowest NAME wins.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Name(u64);

impl Name {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        arbitrary_address_capable: bool,
        industry_group: u8,
        vehicle_system_instance: u8,
        vehicle_system: u8,
        function: u8,
        function_instance: u8,
        ecu_instance: u8,
        manufacturer_code: u16,
        identity_number: u32,
    ) -> Self {
        let mut name: u64 = 0;

        // Arbitrary address capable - 1 bit
        if arbitrary_address_capable {
            name |= 0x8000_0000_0000_0000;
        }

        // Industry group - 3 bits
        name |= u64::from(industry_group & 0x07) << 60;

        // Vehicle system instance - 4 bits
        name |= u64::from(vehicle_system_instance & 0x0F) << 56;

        // Vehicle system - 7 bits
        name |= u64::from(vehicle_system & 0x7F) << 49;

        // Reserved bit

        // Function - 8 bits
        name |= u64::from(function) << 40;

        // Function instance - 5 bits
        name |= u64::from(function_instance & 0x1F) << 35;

        // ECU instance - 3 bits
        name |= u64::from(ecu_instance & 0x07) << 32;

        // Manufacturer code - 11 bits
        name |= u64::from(manufacturer_code & 0x07FF) << 21;

        // Identity number - 21 bits
        name |= u64::from(identity_number & 0x1F_FFFF);

        Name(name)
    }

    /// Wraps a raw 64-bit NAME value.
    pub fn from_raw(raw: u64) -> Self {
        Name(raw)
    }

    /// Decodes the NAME from the eight data bytes of an address-claim frame
    /// (little-endian on the wire).
    pub fn from_le_bytes(bytes: [u8; 8]) -> Self {
        Name(u64::from_le_bytes(bytes))
    }

    /// Encodes the NAME for the data field of an address-claim frame.
    pub fn to_le_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    pub fn arbitrary_address_capable(&self) -> bool {
        self.0 & 0x8000_0000_0000_0000 != 0
    }

    pub fn industry_group(&self) -> u8 {
        ((self.0 >> 60) & 0x07) as u8
    }

    pub fn vehicle_system_instance(&self) -> u8 {
        ((self.0 >> 56) & 0x0F) as u8
    }

    pub fn vehicle_system(&self) -> u8 {
        ((self.0 >> 49) & 0x7F) as u8
    }

    pub fn function(&self) -> u8 {
        ((self.0 >> 40) & 0xFF) as u8
    }

    pub fn function_instance(&self) -> u8 {
        ((self.0 >> 35) & 0x1F) as u8
    }

    pub fn ecu_instance(&self) -> u8 {
        ((self.0 >> 32) & 0x07) as u8
    }

    pub fn manufacturer_code(&self) -> u16 {
        ((self.0 >> 21) & 0x07FF) as u16
    }

    pub fn identity_number(&self) -> u32 {
        (self.0 & 0x1F_FFFF) as u32
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({:#018X})", self.0)
    }
}

/// A NAME field a [`NameFilter`] can select on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameField {
    IdentityNumber,
    ManufacturerCode,
    EcuInstance,
    FunctionInstance,
    Function,
    VehicleSystem,
    VehicleSystemInstance,
    IndustryGroup,
    ArbitraryAddressCapable,
}

/// One component of a partnered control function's identity description.
///
/// A partner matches an observed NAME when every one of its filters matches;
/// an empty filter list matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameFilter {
    field: NameField,
    value: u32,
}

impl NameFilter {
    pub fn new(field: NameField, value: u32) -> Self {
        Self { field, value }
    }

    pub fn field(&self) -> NameField {
        self.field
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    /// Checks this single filter against a NAME.
    pub fn matches(&self, name: Name) -> bool {
        let actual = match self.field {
            NameField::IdentityNumber => name.identity_number(),
            NameField::ManufacturerCode => u32::from(name.manufacturer_code()),
            NameField::EcuInstance => u32::from(name.ecu_instance()),
            NameField::FunctionInstance => u32::from(name.function_instance()),
            NameField::Function => u32::from(name.function()),
            NameField::VehicleSystem => u32::from(name.vehicle_system()),
            NameField::VehicleSystemInstance => u32::from(name.vehicle_system_instance()),
            NameField::IndustryGroup => u32::from(name.industry_group()),
            NameField::ArbitraryAddressCapable => u32::from(name.arbitrary_address_capable()),
        };
        actual == self.value
    }
}

/// True when `name` satisfies every filter in `filters`.
pub fn matches_all(filters: &[NameFilter], name: Name) -> bool {
    !filters.is_empty() && filters.iter().all(|filter| filter.matches(name))
}
