//! HEVC 短期参考图像集 st_ref_pic_set() (7.3.7 / 7.4.8).
//!
//! 帧间预测的 RPS 依赖之前解析的集合, 因此每个集合都推导出完整的
//! DeltaPocS0/S1 列表, 供后续集合引用.

use nalyzer_core::NalResult;

use crate::syntax::{Opts, SyntaxReader};

/// 推导后的短期参考图像集
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShortTermRps {
    /// DeltaPocS0 (负方向, 由近到远)
    pub delta_poc_s0: Vec<i64>,
    pub used_by_curr_pic_s0: Vec<bool>,
    /// DeltaPocS1 (正方向, 由近到远)
    pub delta_poc_s1: Vec<i64>,
    pub used_by_curr_pic_s1: Vec<bool>,
}

impl ShortTermRps {
    pub fn num_negative_pics(&self) -> usize {
        self.delta_poc_s0.len()
    }

    pub fn num_positive_pics(&self) -> usize {
        self.delta_poc_s1.len()
    }

    /// NumDeltaPocs
    pub fn num_delta_pocs(&self) -> usize {
        self.delta_poc_s0.len() + self.delta_poc_s1.len()
    }
}

/// st_ref_pic_set(stRpsIdx)
///
/// `previous` 为已解析的集合 (下标 0..stRpsIdx), `num_sets` 为
/// num_short_term_ref_pic_sets. stRpsIdx 等于 `num_sets` 时为切片头中的集合.
pub fn parse_st_rps(
    r: &mut SyntaxReader<'_>,
    idx: usize,
    num_sets: usize,
    previous: &[ShortTermRps],
) -> NalResult<ShortTermRps> {
    let inter = idx != 0 && r.read_flag("inter_ref_pic_set_prediction_flag")?;
    if inter {
        parse_predicted(r, idx, num_sets, previous)
    } else {
        parse_explicit(r)
    }
}

fn parse_predicted(
    r: &mut SyntaxReader<'_>,
    idx: usize,
    num_sets: usize,
    previous: &[ShortTermRps],
) -> NalResult<ShortTermRps> {
    let delta_idx = if idx == num_sets {
        let max = i64::try_from(idx).unwrap_or(i64::MAX) - 1;
        r.read_ue_with("delta_idx_minus1", Opts::range(0, max))? as usize + 1
    } else {
        1
    };
    let reference = idx
        .checked_sub(delta_idx)
        .and_then(|ref_idx| previous.get(ref_idx))
        .ok_or_else(|| {
            r.invalid(
                "delta_idx_minus1",
                format!("参考 RPS 不存在: stRpsIdx={idx}, delta_idx={delta_idx}"),
            )
        })?;

    let sign = r.read_flag("delta_rps_sign")?;
    let abs_delta = i64::from(r.read_ue_with("abs_delta_rps_minus1", Opts::range(0, 32767))?) + 1;
    let delta_rps = if sign { -abs_delta } else { abs_delta };

    let num_delta_pocs = reference.num_delta_pocs();
    let mut used_by_curr = Vec::new();
    let mut use_delta = Vec::new();
    for j in 0..=num_delta_pocs {
        let used = r.read_flag(&format!("used_by_curr_pic_flag[{j}]"))?;
        // 未出现时推断为 1
        let use_it = used || r.read_flag(&format!("use_delta_flag[{j}]"))?;
        used_by_curr.push(used);
        use_delta.push(use_it);
    }

    Ok(derive_predicted(reference, delta_rps, &used_by_curr, &use_delta))
}

/// 式 (7-61) 与 (7-62)
fn derive_predicted(
    reference: &ShortTermRps,
    delta_rps: i64,
    used_by_curr: &[bool],
    use_delta: &[bool],
) -> ShortTermRps {
    let neg = reference.num_negative_pics();
    let pos = reference.num_positive_pics();
    let all = reference.num_delta_pocs();
    let mut rps = ShortTermRps::default();

    for j in (0..pos).rev() {
        let d_poc = reference.delta_poc_s1[j] + delta_rps;
        if d_poc < 0 && use_delta[neg + j] {
            rps.delta_poc_s0.push(d_poc);
            rps.used_by_curr_pic_s0.push(used_by_curr[neg + j]);
        }
    }
    if delta_rps < 0 && use_delta[all] {
        rps.delta_poc_s0.push(delta_rps);
        rps.used_by_curr_pic_s0.push(used_by_curr[all]);
    }
    for j in 0..neg {
        let d_poc = reference.delta_poc_s0[j] + delta_rps;
        if d_poc < 0 && use_delta[j] {
            rps.delta_poc_s0.push(d_poc);
            rps.used_by_curr_pic_s0.push(used_by_curr[j]);
        }
    }

    for j in (0..neg).rev() {
        let d_poc = reference.delta_poc_s0[j] + delta_rps;
        if d_poc > 0 && use_delta[j] {
            rps.delta_poc_s1.push(d_poc);
            rps.used_by_curr_pic_s1.push(used_by_curr[j]);
        }
    }
    if delta_rps > 0 && use_delta[all] {
        rps.delta_poc_s1.push(delta_rps);
        rps.used_by_curr_pic_s1.push(used_by_curr[all]);
    }
    for j in 0..pos {
        let d_poc = reference.delta_poc_s1[j] + delta_rps;
        if d_poc > 0 && use_delta[neg + j] {
            rps.delta_poc_s1.push(d_poc);
            rps.used_by_curr_pic_s1.push(used_by_curr[neg + j]);
        }
    }
    rps
}

fn parse_explicit(r: &mut SyntaxReader<'_>) -> NalResult<ShortTermRps> {
    let num_negative = r.read_ue_with("num_negative_pics", Opts::range(0, 16))?;
    let num_positive = r.read_ue_with("num_positive_pics", Opts::range(0, 16))?;
    let mut rps = ShortTermRps::default();

    let mut poc = 0i64;
    for i in 0..num_negative {
        let delta = r.read_ue_with(&format!("delta_poc_s0_minus1[{i}]"), Opts::range(0, 32767))?;
        poc -= i64::from(delta) + 1;
        rps.delta_poc_s0.push(poc);
        rps.used_by_curr_pic_s0
            .push(r.read_flag(&format!("used_by_curr_pic_s0_flag[{i}]"))?);
    }
    poc = 0;
    for i in 0..num_positive {
        let delta = r.read_ue_with(&format!("delta_poc_s1_minus1[{i}]"), Opts::range(0, 32767))?;
        poc += i64::from(delta) + 1;
        rps.delta_poc_s1.push(poc);
        rps.used_by_curr_pic_s1
            .push(r.read_flag(&format!("used_by_curr_pic_s1_flag[{i}]"))?);
    }
    Ok(rps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalyzer_core::BitWriter;

    fn explicit(s0: &[i64], s1: &[i64]) -> ShortTermRps {
        ShortTermRps {
            delta_poc_s0: s0.to_vec(),
            used_by_curr_pic_s0: vec![true; s0.len()],
            delta_poc_s1: s1.to_vec(),
            used_by_curr_pic_s1: vec![true; s1.len()],
        }
    }

    #[test]
    fn test_explicit_set() {
        let mut bw = BitWriter::new();
        bw.write_ue(2);
        bw.write_ue(1);
        bw.write_ue(0);
        bw.write_flag(true);
        bw.write_ue(1);
        bw.write_flag(false);
        bw.write_ue(3);
        bw.write_flag(true);
        let data = bw.finish();

        let mut r = SyntaxReader::new(&data, "st_ref_pic_set");
        let rps = parse_st_rps(&mut r, 0, 2, &[]).unwrap();
        assert_eq!(rps.delta_poc_s0, vec![-1, -3]);
        assert_eq!(rps.used_by_curr_pic_s0, vec![true, false]);
        assert_eq!(rps.delta_poc_s1, vec![4]);
        // stRpsIdx 为 0 时不读取 inter_ref_pic_set_prediction_flag
        assert!(r.finish().log.find("inter_ref_pic_set_prediction_flag").is_none());
    }

    #[test]
    fn test_predicted_set_excludes_zero_delta() {
        // 参考集合 {-1, -2 | +1}, deltaRps = -1
        let reference = explicit(&[-1, -2], &[1]);
        let mut bw = BitWriter::new();
        bw.write_flag(true); // inter_ref_pic_set_prediction_flag
        bw.write_flag(true); // delta_rps_sign
        bw.write_ue(0); // abs_delta_rps_minus1
        for _ in 0..4 {
            bw.write_flag(true); // used_by_curr_pic_flag
        }
        let data = bw.finish();

        let mut r = SyntaxReader::new(&data, "st_ref_pic_set");
        let rps = parse_st_rps(&mut r, 1, 2, &[reference]).unwrap();
        // +1-1 = 0 被排除; 新增 deltaRps 本身 -1
        assert_eq!(rps.delta_poc_s0, vec![-1, -2, -3]);
        assert!(rps.delta_poc_s1.is_empty());
        assert_eq!(rps.num_delta_pocs(), 3);
        let out = r.finish();
        assert!(out.is_complete());
        assert!(out.log.find("delta_idx_minus1").is_none());
    }

    #[test]
    fn test_use_delta_flag_drops_entries() {
        let reference = explicit(&[-1], &[]);
        let mut bw = BitWriter::new();
        bw.write_flag(true);
        bw.write_flag(false); // deltaRps = +2
        bw.write_ue(1);
        bw.write_flag(false); // used_by_curr_pic_flag[0]
        bw.write_flag(false); // use_delta_flag[0]
        bw.write_flag(true); // used_by_curr_pic_flag[1]
        let data = bw.finish();

        let mut r = SyntaxReader::new(&data, "st_ref_pic_set");
        let rps = parse_st_rps(&mut r, 1, 2, &[reference]).unwrap();
        assert!(rps.delta_poc_s0.is_empty());
        assert_eq!(rps.delta_poc_s1, vec![2]);
    }

    #[test]
    fn test_invalid_reference_index_fails() {
        let mut bw = BitWriter::new();
        bw.write_flag(true);
        bw.write_ue(3); // delta_idx_minus1 超出已有集合
        bw.write_rbsp_trailing_bits();
        let data = bw.finish();

        let mut r = SyntaxReader::new(&data, "st_ref_pic_set");
        let err = parse_st_rps(&mut r, 1, 1, &[ShortTermRps::default()]).unwrap_err();
        assert!(matches!(err, nalyzer_core::NalError::InvalidData(_)));
        let out = r.finish();
        assert_eq!(out.failure.unwrap().field, "delta_idx_minus1");
    }
}
