use proptest::prelude::*;
use strided_expr::shape::{broadcastable, compute_backstrides, compute_strides, promote};
use strided_expr::{
    assign, assign_with, binary, select_strategy, Array, AssignStrategy, Expression, Layout,
    SliceSpec,
};

fn layout_strategy() -> impl Strategy<Value = Layout> {
    prop_oneof![Just(Layout::RowMajor), Just(Layout::ColumnMajor)]
}

fn shape_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1usize..5, 1..4)
}

fn filled(shape: &[usize], layout: Layout) -> Array<i64> {
    Array::from_fn(shape, layout, |idx| {
        idx.iter().fold(7i64, |acc, &i| acc * 31 + i as i64)
    })
}

/// Evaluate `src` into a fresh destination with each applicable path and
/// check they all agree with the cursor walk.
fn check_paths<E: Expression<Elem = i64>>(src: &E, shape: &[usize], dest_layout: Layout) {
    let mut reference = Array::<i64>::zeros(shape, dest_layout);
    assign_with(&mut reference.view_mut(), src, AssignStrategy::Cursor).unwrap();

    let mut auto = Array::<i64>::zeros(shape, dest_layout);
    assign(&mut auto.view_mut(), src).unwrap();
    assert_eq!(auto, reference);

    for strategy in [AssignStrategy::Linear, AssignStrategy::Strided] {
        let mut forced = Array::<i64>::zeros(shape, dest_layout);
        if assign_with(&mut forced.view_mut(), src, strategy).is_ok() {
            assert_eq!(forced, reference, "{strategy:?}");
        }
    }
}

proptest! {
    #[test]
    fn promote_is_idempotent(shape in prop::collection::vec(0usize..6, 0..5)) {
        prop_assert_eq!(promote(&shape, &shape).unwrap().to_vec(), shape);
    }

    #[test]
    fn broadcastable_is_symmetric(
        a in prop::collection::vec(prop_oneof![Just(1usize), 1usize..4], 0..4),
        b in prop::collection::vec(prop_oneof![Just(1usize), 1usize..4], 0..4),
    ) {
        prop_assert_eq!(broadcastable(&a, &b), broadcastable(&b, &a));
        prop_assert_eq!(broadcastable(&a, &b), promote(&a, &b).is_ok());
    }

    #[test]
    fn backstrides_match_strides(shape in shape_strategy(), layout in layout_strategy()) {
        let strides = compute_strides(&shape, layout);
        let back = compute_backstrides(&shape, &strides);
        for i in 0..shape.len() {
            prop_assert_eq!(back[i], strides[i] * (shape[i] as isize - 1));
        }
    }

    #[test]
    fn dense_sources_agree(
        shape in shape_strategy(),
        src_layout in layout_strategy(),
        dest_layout in layout_strategy(),
    ) {
        let src = filled(&shape, src_layout);
        check_paths(&src, &shape, dest_layout);
    }

    #[test]
    fn permuted_sources_agree(
        shape in prop::collection::vec(1usize..5, 3),
        perm in Just(vec![0usize, 1, 2]).prop_shuffle(),
        dest_layout in layout_strategy(),
    ) {
        let src = filled(&shape, Layout::RowMajor);
        let p = src.permute(&perm).unwrap();
        let dims = p.dims().to_vec();
        check_paths(&p, &dims, dest_layout);
    }

    #[test]
    fn stepped_views_agree(
        shape in prop::collection::vec(2usize..7, 2),
        step in prop_oneof![Just(2isize), Just(-1), Just(-2), Just(3)],
        dest_layout in layout_strategy(),
    ) {
        let src = filled(&shape, Layout::ColumnMajor);
        let specs = [SliceSpec::All.with_step(step), SliceSpec::range(Some(1), None, 1)];
        let v = src.slice(&specs).unwrap();
        let dims = v.dims().to_vec();
        check_paths(&v, &dims, dest_layout);
    }

    #[test]
    fn broadcast_sources_agree(
        shape in shape_strategy(),
        mask in prop::collection::vec(any::<bool>(), 3),
        lead in 0usize..2,
        dest_layout in layout_strategy(),
    ) {
        // collapse some axes to 1 and drop `lead` leading axes
        let src_shape: Vec<usize> = shape
            .iter()
            .zip(mask.iter().cycle())
            .map(|(&n, &m)| if m { 1 } else { n })
            .skip(lead.min(shape.len()))
            .collect();
        let src = filled(&src_shape, Layout::RowMajor);
        check_paths(&src, &shape, dest_layout);

        let f = binary(|x: i64, y: i64| x * 3 - y, &src, &src).unwrap();
        check_paths(&f, &shape, dest_layout);
    }

    #[test]
    fn broadcast_axis_never_moves_the_address(
        shape in shape_strategy(),
        axis_seed in any::<usize>(),
        n in 2usize..8,
    ) {
        let axis = axis_seed % shape.len();
        let mut src_shape = shape.clone();
        src_shape[axis] = 1;
        let mut target = shape.clone();
        target[axis] = n;

        let src = filled(&src_shape, Layout::RowMajor);
        let mut cursor = src.cursor(&target);
        let start = cursor.position();
        for _ in 0..n {
            strided_expr::Cursor::step(&mut cursor, axis);
            prop_assert_eq!(cursor.position(), start);
        }
    }

    #[test]
    fn full_view_round_trips(shape in shape_strategy(), layout in layout_strategy()) {
        let a = filled(&shape, layout);
        let v = a.slice(&[SliceSpec::Ellipsis]).unwrap();
        prop_assert_eq!(v.dims(), a.dims());
        prop_assert_eq!(v.strides(), a.strides());
        prop_assert_eq!(v.offset(), a.offset());
        let lazy = strided_expr::view(&a, &[]).unwrap();
        prop_assert_eq!(Array::from_expr(&lazy, layout).unwrap(), a);
    }

    #[test]
    fn matching_layouts_take_the_linear_path(shape in shape_strategy(), layout in layout_strategy()) {
        let src = filled(&shape, layout);
        let mut dest = Array::<i64>::zeros(&shape, layout);
        prop_assert_eq!(select_strategy(&dest.view_mut(), &src), AssignStrategy::Linear);
    }
}
