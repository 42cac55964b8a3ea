//! CUDA C source for the stream kernels, generated per element type.
//!
//! The source is compiled at stream construction with NVRTC. Elementwise
//! kernels run one lane per element over an exact grid, so they carry no
//! bounds check. The dot kernel is a grid-stride accumulation followed by a
//! shared-memory tree reduction, one partial per block.

use ringstream_core::scalar::StreamScalar;
use ringstream_core::types::BLOCK_SIZE;

/// Entry points defined by [`kernel_source`], in launch-table order.
pub const KERNEL_NAMES: [&str; 7] = [
    "init_kernel",
    "copy_kernel",
    "mul_kernel",
    "add_kernel",
    "triad_kernel",
    "nstream_kernel",
    "dot_kernel",
];

/// Generate the kernel module for element type `T`.
pub fn kernel_source<T: StreamScalar>() -> String {
    format!(
        r#"
#define TBSIZE {block_size}

extern "C" __global__ void init_kernel({t}* a, {t}* b, {t}* c, {t} init_a, {t} init_b, {t} init_c) {{
    const size_t i = (size_t)blockDim.x * blockIdx.x + threadIdx.x;
    a[i] = init_a;
    b[i] = init_b;
    c[i] = init_c;
}}

extern "C" __global__ void copy_kernel(const {t}* a, {t}* c) {{
    const size_t i = (size_t)blockDim.x * blockIdx.x + threadIdx.x;
    c[i] = a[i];
}}

extern "C" __global__ void mul_kernel({t}* b, const {t}* c, {t} scalar) {{
    const size_t i = (size_t)blockDim.x * blockIdx.x + threadIdx.x;
    b[i] = scalar * c[i];
}}

extern "C" __global__ void add_kernel(const {t}* a, const {t}* b, {t}* c) {{
    const size_t i = (size_t)blockDim.x * blockIdx.x + threadIdx.x;
    c[i] = a[i] + b[i];
}}

extern "C" __global__ void triad_kernel({t}* a, const {t}* b, const {t}* c, {t} scalar) {{
    const size_t i = (size_t)blockDim.x * blockIdx.x + threadIdx.x;
    a[i] = b[i] + scalar * c[i];
}}

extern "C" __global__ void nstream_kernel({t}* a, const {t}* b, const {t}* c, {t} scalar) {{
    const size_t i = (size_t)blockDim.x * blockIdx.x + threadIdx.x;
    a[i] += b[i] + scalar * c[i];
}}

extern "C" __global__ void dot_kernel(const {t}* a, const {t}* b, {t}* sums, size_t array_size) {{
    __shared__ {t} tb_sum[TBSIZE];

    const size_t local_i = threadIdx.x;
    size_t i = (size_t)blockDim.x * blockIdx.x + local_i;

    tb_sum[local_i] = ({t})0;
    for (; i < array_size; i += (size_t)blockDim.x * gridDim.x) {{
        tb_sum[local_i] += a[i] * b[i];
    }}

    // Tree reduction
    for (unsigned int offset = blockDim.x / 2; offset > 0; offset /= 2) {{
        __syncthreads();
        if (local_i < offset) {{
            tb_sum[local_i] += tb_sum[local_i + offset];
        }}
    }}

    if (local_i == 0) {{
        sums[blockIdx.x] = tb_sum[0];
    }}
}}
"#,
        block_size = BLOCK_SIZE,
        t = T::C_TYPE,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_defines_every_kernel() {
        let source = kernel_source::<f32>();
        for name in KERNEL_NAMES {
            assert!(
                source.contains(&format!("__global__ void {}(", name)),
                "missing {}",
                name
            );
        }
        assert!(source.contains("#define TBSIZE 1024"));
    }

    #[test]
    fn test_launch_table_order() {
        let stems: Vec<&str> = KERNEL_NAMES
            .iter()
            .map(|name| name.trim_end_matches("_kernel"))
            .collect();
        assert_eq!(stems, ["init", "copy", "mul", "add", "triad", "nstream", "dot"]);
    }

    #[test]
    fn test_source_uses_element_type() {
        let single = kernel_source::<f32>();
        let double = kernel_source::<f64>();
        assert!(single.contains("__shared__ float tb_sum[TBSIZE]"));
        assert!(!single.contains("double"));
        assert!(double.contains("__shared__ double tb_sum[TBSIZE]"));
        assert!(double.contains("double scalar"));
    }

    #[test]
    fn test_source_braces_balanced() {
        let source = kernel_source::<f64>();
        let open = source.matches('{').count();
        let close = source.matches('}').count();
        assert_eq!(open, close);
    }
}
