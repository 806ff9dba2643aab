//! Single-byte wire enums shared by client and server messages.
//! Each tag is the ASCII letter the server/client actually puts on the wire.

use crate::errors::{self, DecodeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IoFormat {
    Binary = b'b',
    Json = b'j',
    JsonElements = b'J',
    None = b'n',
}

impl TryFrom<u8> for IoFormat {
    type Error = DecodeError;
    fn try_from(v: u8) -> Result<Self, DecodeError> {
        use IoFormat::*;
        Ok(match v {
            b'b' => Binary,
            b'j' => Json,
            b'J' => JsonElements,
            b'n' => None,
            _ => return errors::InvalidIoFormat { io_format: v }.fail(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Cardinality {
    NoResult = b'n',
    AtMostOne = b'o',
    One = b'A',
    Many = b'm',
    AtLeastOne = b'M',
}

impl TryFrom<u8> for Cardinality {
    type Error = DecodeError;
    fn try_from(v: u8) -> Result<Self, DecodeError> {
        use Cardinality::*;
        Ok(match v {
            b'n' => NoResult,
            b'o' => AtMostOne,
            b'A' => One,
            b'm' => Many,
            b'M' => AtLeastOne,
            _ => return errors::InvalidCardinality { cardinality: v }.fail(),
        })
    }
}

impl Cardinality {
    pub fn is_single(&self) -> bool {
        matches!(self, Cardinality::AtMostOne | Cardinality::One)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum InputLanguage {
    EdgeQL = b'E',
    SQL = b'S',
}

impl TryFrom<u8> for InputLanguage {
    type Error = DecodeError;
    fn try_from(v: u8) -> Result<Self, DecodeError> {
        use InputLanguage::*;
        Ok(match v {
            b'E' => EdgeQL,
            b'S' => SQL,
            _ => return errors::InvalidInputLanguage { input_language: v }.fail(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DescribeAspect {
    DataDescription = b'T',
}

impl TryFrom<u8> for DescribeAspect {
    type Error = DecodeError;
    fn try_from(v: u8) -> Result<Self, DecodeError> {
        use DescribeAspect::*;
        Ok(match v {
            b'T' => DataDescription,
            _ => return errors::InvalidAspect { aspect: v }.fail(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TransactionState {
    NotInTransaction = b'I',
    InTransaction = b'T',
    InFailedTransaction = b'E',
}

impl TryFrom<u8> for TransactionState {
    type Error = DecodeError;
    fn try_from(v: u8) -> Result<Self, DecodeError> {
        use TransactionState::*;
        Ok(match v {
            b'I' => NotInTransaction,
            b'T' => InTransaction,
            b'E' => InFailedTransaction,
            _ => {
                return errors::InvalidTransactionState {
                    transaction_state: v,
                }
                .fail()
            }
        })
    }
}
