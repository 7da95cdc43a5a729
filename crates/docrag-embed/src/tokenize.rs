use anyhow::Result;
use candle_core::{Device, Tensor};
use tokenizers::Encoding;

/// Model inputs for one batch, each `[B, T]`.
pub struct BatchInputs {
    pub input_ids: Tensor,
    pub attention_mask: Tensor,
    pub token_type_ids: Tensor,
}

/// Truncate each encoding to `max_len` and right-pad all rows to the longest one.
pub fn pad_batch(encodings: &[Encoding], max_len: usize, pad_id: u32, device: &Device) -> Result<BatchInputs> {
    anyhow::ensure!(!encodings.is_empty(), "cannot build an empty batch");
    let seq_len = encodings.iter().map(|e| e.get_ids().len().min(max_len)).max().unwrap_or(0).max(1);
    let rows = encodings.len();
    let mut ids = Vec::with_capacity(rows * seq_len);
    let mut mask = Vec::with_capacity(rows * seq_len);
    let mut types = Vec::with_capacity(rows * seq_len);
    for enc in encodings {
        let n = enc.get_ids().len().min(seq_len);
        ids.extend_from_slice(&enc.get_ids()[..n]);
        mask.extend_from_slice(&enc.get_attention_mask()[..n]);
        types.extend_from_slice(&enc.get_type_ids()[..n]);
        let pad = seq_len - n;
        ids.extend(std::iter::repeat(pad_id).take(pad));
        mask.extend(std::iter::repeat(0u32).take(pad));
        types.extend(std::iter::repeat(0u32).take(pad));
    }
    Ok(BatchInputs {
        input_ids: Tensor::from_vec(ids, (rows, seq_len), device)?,
        attention_mask: Tensor::from_vec(mask, (rows, seq_len), device)?,
        token_type_ids: Tensor::from_vec(types, (rows, seq_len), device)?,
    })
}
