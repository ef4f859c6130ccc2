// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::bundle::ActionKind;
use crate::domain::error::AppError;
use crate::services::reconcile::dispatcher::PriorityFee;
use solana_sdk::message::AddressLookupTableAccount;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::{CompileError, VersionedMessage, v0};
use solana_sdk::packet::PACKET_DATA_SIZE;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupLabel {
    pub index: u16,
    pub action: ActionKind,
}

impl fmt::Display for GroupLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.action, self.index)
    }
}

/// Instructions for one slot action. Never split across transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionGroup {
    pub label: GroupLabel,
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionBatch {
    pub groups: Vec<InstructionGroup>,
}

impl TransactionBatch {
    pub fn instructions(&self) -> Vec<Instruction> {
        self.groups
            .iter()
            .flat_map(|g| g.instructions.iter().cloned())
            .collect()
    }

    pub fn labels(&self) -> Vec<GroupLabel> {
        self.groups.iter().map(|g| g.label).collect()
    }

    /// v0 message with the priority fee instructions in front.
    pub fn compile(
        &self,
        payer: &Pubkey,
        fee: PriorityFee,
        lookup_tables: &[AddressLookupTableAccount],
        blockhash: Hash,
    ) -> Result<VersionedMessage, AppError> {
        let mut instructions = fee.instructions().to_vec();
        instructions.extend(self.instructions());
        let message = v0::Message::try_compile(payer, &instructions, lookup_tables, blockhash)
            .map_err(|e| AppError::validation("transaction batch", e.to_string()))?;
        Ok(VersionedMessage::V0(message))
    }
}

/// Whether a set of instructions still fits into one transaction.
pub trait SizeOracle {
    fn fits(&self, instructions: &[Instruction]) -> Result<bool, AppError>;
}

/// Compiles and serializes a candidate transaction instead of predicting its
/// size; lookup-table compression makes the closed form unreliable.
#[derive(Debug, Clone)]
pub struct TransactionSizeOracle {
    payer: Pubkey,
    lookup_tables: Vec<AddressLookupTableAccount>,
}

impl TransactionSizeOracle {
    pub fn new(payer: Pubkey, lookup_tables: Vec<AddressLookupTableAccount>) -> Self {
        Self { payer, lookup_tables }
    }

    /// Serialized bytes of a signed transaction carrying `instructions`, or
    /// `None` when the account set cannot be indexed at all.
    pub fn serialized_size(&self, instructions: &[Instruction]) -> Result<Option<usize>, AppError> {
        // Placeholder compute-budget pair, same encoded size as the real one.
        let mut all = PriorityFee::placeholder().instructions().to_vec();
        all.extend_from_slice(instructions);
        let message = match v0::Message::try_compile(&self.payer, &all, &self.lookup_tables, Hash::default()) {
            Ok(message) => message,
            Err(CompileError::AccountIndexOverflow | CompileError::AddressTableLookupIndexOverflow) => {
                return Ok(None);
            }
            Err(e) => return Err(AppError::validation("transaction batch", e.to_string())),
        };

        let transaction = VersionedTransaction {
            signatures: vec![Signature::default(); usize::from(message.header.num_required_signatures)],
            message: VersionedMessage::V0(message),
        };
        let size = bincode::serialized_size(&transaction)
            .map_err(|e| AppError::validation("transaction batch", e.to_string()))?;
        Ok(Some(size as usize))
    }
}

impl SizeOracle for TransactionSizeOracle {
    fn fits(&self, instructions: &[Instruction]) -> Result<bool, AppError> {
        Ok(self
            .serialized_size(instructions)?
            .is_some_and(|size| size <= PACKET_DATA_SIZE))
    }
}

/// Greedy first-fit packing that keeps input order.
///
/// A group that does not fit even on its own is reported with its label.
pub fn pack(groups: Vec<InstructionGroup>, oracle: &dyn SizeOracle) -> Result<Vec<TransactionBatch>, AppError> {
    let mut batches = Vec::new();
    let mut current = TransactionBatch::default();
    let mut current_instructions: Vec<Instruction> = Vec::new();

    for group in groups {
        let mut tentative = current_instructions.clone();
        tentative.extend(group.instructions.iter().cloned());
        if oracle.fits(&tentative)? {
            current_instructions = tentative;
            current.groups.push(group);
            continue;
        }

        if !oracle.fits(&group.instructions)? {
            return Err(AppError::OversizedGroup {
                index: group.label.index,
                action: group.label.action,
            });
        }
        if !current.groups.is_empty() {
            batches.push(std::mem::take(&mut current));
        }
        current_instructions = group.instructions.clone();
        current.groups.push(group);
    }
    if !current.groups.is_empty() {
        batches.push(current);
    }

    tracing::debug!(target: "batcher", batches = batches.len(), "Packed instruction groups");
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::instruction::AccountMeta;

    /// Fits while the instruction count stays within a fixed limit.
    struct CountOracle(usize);

    impl SizeOracle for CountOracle {
        fn fits(&self, instructions: &[Instruction]) -> Result<bool, AppError> {
            Ok(instructions.len() <= self.0)
        }
    }

    fn group(index: u16, count: usize) -> InstructionGroup {
        let program = Pubkey::new_unique();
        InstructionGroup {
            label: GroupLabel {
                index,
                action: ActionKind::Open,
            },
            instructions: (0..count)
                .map(|i| Instruction::new_with_bytes(program, &[i as u8; 8], vec![]))
                .collect(),
        }
    }

    #[test]
    fn preserves_order_and_fills_greedily() {
        let groups = vec![group(0, 2), group(1, 2), group(2, 3), group(3, 1), group(4, 4)];
        let batches = pack(groups.clone(), &CountOracle(4)).unwrap();
        let sizes: Vec<Vec<u16>> = batches
            .iter()
            .map(|b| b.labels().iter().map(|l| l.index).collect())
            .collect();
        assert_eq!(sizes, vec![vec![0, 1], vec![2, 3], vec![4]]);

        let flattened: Vec<InstructionGroup> = batches.into_iter().flat_map(|b| b.groups).collect();
        assert_eq!(flattened, groups);
    }

    #[test]
    fn oversized_group_names_its_slot() {
        let err = pack(vec![group(0, 1), group(9, 5)], &CountOracle(4)).unwrap_err();
        assert!(matches!(
            err,
            AppError::OversizedGroup {
                index: 9,
                action: ActionKind::Open
            }
        ));
    }

    #[test]
    fn no_groups_no_batches() {
        assert!(pack(Vec::new(), &CountOracle(1)).unwrap().is_empty());
    }

    #[test]
    fn real_oracle_rejects_payloads_past_packet_limit() {
        let payer = Pubkey::new_unique();
        let oracle = TransactionSizeOracle::new(payer, Vec::new());
        let program = Pubkey::new_unique();
        let small = Instruction::new_with_bytes(program, &[0u8; 64], vec![AccountMeta::new(payer, true)]);
        assert!(oracle.fits(&[small.clone()]).unwrap());

        let large = Instruction::new_with_bytes(program, &[0u8; PACKET_DATA_SIZE], vec![]);
        assert!(!oracle.fits(&[large]).unwrap());

        let many: Vec<Instruction> = (0..40)
            .map(|_| {
                Instruction::new_with_bytes(program, &[1u8; 4], vec![AccountMeta::new(Pubkey::new_unique(), false)])
            })
            .collect();
        assert!(!oracle.fits(&many).unwrap());

        let batches = pack(
            (0..12)
                .map(|i| InstructionGroup {
                    label: GroupLabel {
                        index: i,
                        action: ActionKind::Close,
                    },
                    instructions: vec![small.clone(); 1],
                })
                .map(|mut g| {
                    g.instructions[0].data = vec![7u8; 200];
                    g
                })
                .collect(),
            &oracle,
        )
        .unwrap();
        assert!(batches.len() > 1);
        for batch in &batches {
            assert!(oracle.fits(&batch.instructions()).unwrap());
        }
    }

    #[test]
    fn lookup_tables_let_account_heavy_groups_share_a_batch() {
        let payer = Pubkey::new_unique();
        let program = Pubkey::new_unique();
        let groups: Vec<InstructionGroup> = (0..12u16)
            .map(|index| InstructionGroup {
                label: GroupLabel {
                    index,
                    action: ActionKind::Open,
                },
                instructions: vec![Instruction::new_with_bytes(
                    program,
                    &[index as u8; 16],
                    (0..8).map(|_| AccountMeta::new(Pubkey::new_unique(), false)).collect(),
                )],
            })
            .collect();
        let table = AddressLookupTableAccount {
            key: Pubkey::new_unique(),
            addresses: groups
                .iter()
                .flat_map(|g| g.instructions.iter().flat_map(|ix| ix.accounts.iter().map(|a| a.pubkey)))
                .collect(),
        };

        let plain = TransactionSizeOracle::new(payer, Vec::new());
        let compressed = TransactionSizeOracle::new(payer, vec![table]);
        let plain_batches = pack(groups.clone(), &plain).unwrap();
        let compressed_batches = pack(groups.clone(), &compressed).unwrap();

        assert!(plain_batches.len() > 1);
        assert!(compressed_batches.len() < plain_batches.len());
        for batch in &plain_batches {
            assert!(plain.fits(&batch.instructions()).unwrap());
        }
        for batch in &compressed_batches {
            assert!(compressed.fits(&batch.instructions()).unwrap());
        }
        let all: Vec<Instruction> = groups.iter().flat_map(|g| g.instructions.iter().cloned()).collect();
        assert!(!plain.fits(&all).unwrap());
        assert!(
            plain.serialized_size(&all).unwrap().unwrap() > compressed.serialized_size(&all).unwrap().unwrap()
        );
    }
}
